//! API request/response models for bookings.

use super::pagination::Pagination;
use crate::db::models::bookings::{BookingDBResponse, BookingStatus};
use crate::types::{ApplicationId, BookingId, ShiftId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: BookingId,
    #[schema(value_type = String, format = "uuid")]
    pub shift_id: ShiftId,
    #[schema(value_type = String, format = "uuid")]
    pub application_id: ApplicationId,
    #[schema(value_type = String, format = "uuid")]
    pub provider_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub requester_id: UserId,
    pub status: BookingStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
    /// Billable quarter-hour units, recorded at check-out
    pub quarter_hours: Option<i32>,
    pub provider_payout_cents: Option<i64>,
    pub platform_fee_cents: Option<i64>,
    pub requester_total_cents: Option<i64>,
    /// Set when settlement failed and is awaiting an explicit retry
    pub payment_failure: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<BookingDBResponse> for BookingResponse {
    fn from(booking: BookingDBResponse) -> Self {
        Self {
            id: booking.id,
            shift_id: booking.shift_id,
            application_id: booking.application_id,
            provider_id: booking.provider_id,
            requester_id: booking.requester_id,
            status: booking.status,
            checked_in_at: booking.checked_in_at,
            checked_out_at: booking.checked_out_at,
            quarter_hours: booking.quarter_hours,
            provider_payout_cents: booking.provider_payout_cents,
            platform_fee_cents: booking.platform_fee_cents,
            requester_total_cents: booking.requester_total_cents,
            payment_failure: booking.payment_failure,
            paid_at: booking.paid_at,
            created_at: booking.created_at,
        }
    }
}

/// Query parameters for listing the caller's bookings
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListBookingsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Filter by booking status
    pub status: Option<BookingStatus>,

    /// Filter by shift
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub shift_id: Option<ShiftId>,
}
