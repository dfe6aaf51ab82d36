//! API request/response models for shift applications.

use super::{bookings::BookingResponse, pagination::Pagination};
use crate::db::models::applications::{ApplicationDBResponse, ApplicationStatus};
use crate::types::{ApplicationId, ShiftId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ApplicationCreate {
    /// Optional note to the requester
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApplicationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ApplicationId,
    #[schema(value_type = String, format = "uuid")]
    pub shift_id: ShiftId,
    #[schema(value_type = String, format = "uuid")]
    pub provider_id: UserId,
    pub message: String,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ApplicationDBResponse> for ApplicationResponse {
    fn from(application: ApplicationDBResponse) -> Self {
        Self {
            id: application.id,
            shift_id: application.shift_id,
            provider_id: application.provider_id,
            message: application.message,
            status: application.status,
            created_at: application.created_at,
            updated_at: application.updated_at,
        }
    }
}

/// Outcome of accepting an application: the new booking, plus whether the
/// acceptance filled the shift (rejecting the remaining pending applicants).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AcceptResponse {
    pub application: ApplicationResponse,
    pub booking: BookingResponse,
    pub shift_filled: bool,
}

/// Query parameters for a provider listing their own applications
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListApplicationsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
