//! Database models for posted shifts.

use crate::types::{ShiftId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Shift lifecycle status stored as TEXT in database.
///
/// Transitions: `open -> filled` (capacity reached), `open|filled -> cancelled`
/// (requester cancels before start), `filled -> completed` (requester confirms
/// the work happened). `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Open,
    Filled,
    Completed,
    Cancelled,
}

impl ShiftStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ShiftStatus::Completed | ShiftStatus::Cancelled)
    }
}

/// Database response for a shift row
#[derive(Debug, Clone, FromRow)]
pub struct ShiftDBResponse {
    pub id: ShiftId,
    pub requester_id: UserId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub hourly_rate: Decimal,
    pub headcount: i32,
    pub status: ShiftStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database request for creating a new shift
#[derive(Debug, Clone)]
pub struct ShiftCreateDBRequest {
    pub requester_id: UserId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub hourly_rate: Decimal,
    pub headcount: i32,
}

/// Filter for listing shifts
#[derive(Debug, Clone)]
pub struct ShiftFilter {
    pub requester_id: Option<UserId>,
    pub status: Option<ShiftStatus>,
    pub skip: i64,
    pub limit: i64,
}

impl ShiftFilter {
    pub fn new(requester_id: Option<UserId>, status: Option<ShiftStatus>, skip: i64, limit: i64) -> Self {
        Self {
            requester_id,
            status,
            skip,
            limit,
        }
    }
}
