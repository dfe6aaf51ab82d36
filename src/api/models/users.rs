//! API request/response models for users.

use crate::db::models::users::{UserDBResponse, UserRole};
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The authenticated caller, resolved from the trusted gateway header.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub verified: bool,
    pub profile_complete: bool,
    pub payout_account_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub verified: bool,
    pub profile_complete: bool,
    /// Whether a payout account has been linked. The account id itself is
    /// never exposed through the API.
    pub has_payout_account: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(user: UserDBResponse) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            verified: user.verified,
            profile_complete: user.profile_complete,
            has_payout_account: user.payout_account_id.is_some(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Records the connected-account id produced by the external payout
/// onboarding flow.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PayoutAccountUpdate {
    pub payout_account_id: String,
}
