//! API request/response models for shifts.

use super::pagination::Pagination;
use crate::db::models::shifts::{ShiftDBResponse, ShiftStatus};
use crate::errors::Error;
use crate::types::{ShiftId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShiftCreate {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Hourly rate in dollars, must be positive
    #[schema(value_type = String, example = "40.00")]
    pub hourly_rate: Decimal,
    /// Number of providers needed (default: 1)
    #[serde(default = "default_headcount")]
    pub headcount: i32,
}

fn default_headcount() -> i32 {
    1
}

impl ShiftCreate {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Shift title must not be empty".to_string(),
            });
        }
        if self.hourly_rate <= Decimal::ZERO {
            return Err(Error::BadRequest {
                message: "Hourly rate must be positive".to_string(),
            });
        }
        if self.headcount < 1 {
            return Err(Error::BadRequest {
                message: "Headcount must be at least 1".to_string(),
            });
        }
        if self.ends_at <= self.starts_at {
            return Err(Error::BadRequest {
                message: "Shift must end after it starts".to_string(),
            });
        }
        if self.starts_at <= now {
            return Err(Error::BadRequest {
                message: "Shift must start in the future".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShiftResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ShiftId,
    #[schema(value_type = String, format = "uuid")]
    pub requester_id: UserId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[schema(value_type = String, example = "40.00")]
    pub hourly_rate: Decimal,
    pub headcount: i32,
    pub status: ShiftStatus,
    pub created_at: DateTime<Utc>,
}

impl From<ShiftDBResponse> for ShiftResponse {
    fn from(shift: ShiftDBResponse) -> Self {
        Self {
            id: shift.id,
            requester_id: shift.requester_id,
            title: shift.title,
            description: shift.description,
            location: shift.location,
            starts_at: shift.starts_at,
            ends_at: shift.ends_at,
            hourly_rate: shift.hourly_rate,
            headcount: shift.headcount,
            status: shift.status,
            created_at: shift.created_at,
        }
    }
}

/// Query parameters for listing shifts
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListShiftsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Filter by shift status
    pub status: Option<ShiftStatus>,

    /// Only return shifts posted by the calling requester
    #[serde(default)]
    pub mine: bool,
}
