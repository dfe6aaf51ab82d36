//! Authentication and authorization.
//!
//! shiftctl runs behind a trusted gateway that authenticates callers and
//! forwards their identity in a configurable header (`auth.user_header`,
//! `x-shiftctl-user` by default). This module turns that header into a
//! [`CurrentUser`](crate::api::models::users::CurrentUser) extractor and
//! provides role checks for handlers.
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use shiftctl::api::models::users::CurrentUser;
//!
//! async fn protected_handler(user: CurrentUser) -> Result<String, Error> {
//!     Ok(format!("Hello, {}!", user.email))
//! }
//! ```

pub mod current_user;

use crate::api::models::users::CurrentUser;
use crate::db::models::users::UserRole;
use crate::errors::{Error, Result};

/// Reject callers that are not providers.
pub fn require_provider(user: &CurrentUser) -> Result<()> {
    if user.role != UserRole::Provider {
        return Err(Error::Forbidden {
            message: "Only providers may perform this action".to_string(),
        });
    }
    Ok(())
}

/// Reject callers that are not requesters.
pub fn require_requester(user: &CurrentUser) -> Result<()> {
    if user.role != UserRole::Requester {
        return Err(Error::Forbidden {
            message: "Only requesters may perform this action".to_string(),
        });
    }
    Ok(())
}

/// Requesters must finish their organization profile before they can post
/// shifts or take on staff.
pub fn require_eligible_requester(user: &CurrentUser) -> Result<()> {
    require_requester(user)?;
    if !user.profile_complete {
        return Err(Error::Forbidden {
            message: "Complete your organization profile before posting shifts".to_string(),
        });
    }
    Ok(())
}

/// Providers must be vetted before they can apply to shifts.
pub fn require_eligible_provider(user: &CurrentUser) -> Result<()> {
    require_provider(user)?;
    if !user.verified {
        return Err(Error::Forbidden {
            message: "Your account has not been verified yet".to_string(),
        });
    }
    if !user.profile_complete {
        return Err(Error::Forbidden {
            message: "Complete your profile before applying to shifts".to_string(),
        });
    }
    Ok(())
}
