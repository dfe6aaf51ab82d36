//! Database models for shift applications.

use crate::types::{ApplicationId, ShiftId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Application lifecycle status stored as TEXT in database.
///
/// Transitions: `pending -> accepted` (requester accepts), `pending ->
/// rejected` (requester rejects, or cascade when the shift fills or is
/// cancelled), `pending -> withdrawn` (provider withdraws). Everything but
/// `pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

/// Database response for an application row
#[derive(Debug, Clone, FromRow)]
pub struct ApplicationDBResponse {
    pub id: ApplicationId,
    pub shift_id: ShiftId,
    pub provider_id: UserId,
    pub message: String,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database request for creating a new application
#[derive(Debug, Clone)]
pub struct ApplicationCreateDBRequest {
    pub shift_id: ShiftId,
    pub provider_id: UserId,
    pub message: String,
}
