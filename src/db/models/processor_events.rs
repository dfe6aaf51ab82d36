//! Database models for the processor event ledger.

use crate::types::BookingId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A webhook event recorded from the payment processor.
///
/// The `event_id` primary key is what makes reconciliation idempotent:
/// replayed deliveries insert nothing and are treated as already applied.
#[derive(Debug, Clone, FromRow)]
pub struct ProcessorEventDBResponse {
    pub event_id: String,
    pub event_type: String,
    pub booking_id: Option<BookingId>,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

/// Database request for recording a processor event
#[derive(Debug, Clone)]
pub struct ProcessorEventCreateDBRequest {
    pub event_id: String,
    pub event_type: String,
    pub booking_id: Option<BookingId>,
    pub payload: serde_json::Value,
}
