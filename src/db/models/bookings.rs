//! Database models for bookings.
//!
//! A booking is created the moment an application is accepted and carries the
//! work-tracking and settlement state for that provider/shift pair. Earnings
//! columns are populated at check-out and never recomputed afterwards.

use crate::rates::Earnings;
use crate::types::{ApplicationId, BookingId, ShiftId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Booking lifecycle status stored as TEXT in database.
///
/// Transitions: `confirmed -> checked_in -> checked_out -> completed`
/// (settlement succeeds); `confirmed|checked_in -> cancelled` (before any
/// work product exists); `completed -> disputed` (requester flags a
/// post-payment anomaly). `cancelled` and `disputed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    CheckedIn,
    CheckedOut,
    Completed,
    Cancelled,
    Disputed,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Disputed
        )
    }
}

/// Database response for a booking row
#[derive(Debug, Clone, FromRow)]
pub struct BookingDBResponse {
    pub id: BookingId,
    pub shift_id: ShiftId,
    pub application_id: ApplicationId,
    pub provider_id: UserId,
    pub requester_id: UserId,
    pub status: BookingStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub quarter_hours: Option<i32>,
    pub provider_payout_cents: Option<i64>,
    pub platform_fee_cents: Option<i64>,
    pub requester_total_cents: Option<i64>,
    pub processor_payment_id: Option<String>,
    pub payment_failure: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingDBResponse {
    /// Earnings recorded at check-out, if the booking has been priced.
    pub fn earnings(&self) -> Option<Earnings> {
        Some(Earnings {
            quarter_hours: self.quarter_hours?,
            provider_payout_cents: self.provider_payout_cents?,
            platform_fee_cents: self.platform_fee_cents?,
            requester_total_cents: self.requester_total_cents?,
        })
    }
}

/// Database request for creating a new booking
#[derive(Debug, Clone)]
pub struct BookingCreateDBRequest {
    pub shift_id: ShiftId,
    pub application_id: ApplicationId,
    pub provider_id: UserId,
    pub requester_id: UserId,
}

/// Filter for listing bookings
#[derive(Debug, Clone)]
pub struct BookingFilter {
    pub provider_id: Option<UserId>,
    pub requester_id: Option<UserId>,
    pub shift_id: Option<ShiftId>,
    pub status: Option<BookingStatus>,
    pub skip: i64,
    pub limit: i64,
}

impl BookingFilter {
    pub fn for_provider(provider_id: UserId, skip: i64, limit: i64) -> Self {
        Self {
            provider_id: Some(provider_id),
            requester_id: None,
            shift_id: None,
            status: None,
            skip,
            limit,
        }
    }

    pub fn for_requester(requester_id: UserId, skip: i64, limit: i64) -> Self {
        Self {
            provider_id: None,
            requester_id: Some(requester_id),
            shift_id: None,
            status: None,
            skip,
            limit,
        }
    }
}
