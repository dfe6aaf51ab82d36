//! Database models for marketplace users.
//!
//! Users mirror identities managed by the upstream gateway; shiftctl stores
//! the marketplace-specific attributes (role, verification, payout account).

use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Marketplace role stored as TEXT in database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Works shifts and receives payouts
    Provider,
    /// Posts shifts and pays for completed work
    Requester,
}

/// Database response for a user row
#[derive(Debug, Clone, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub verified: bool,
    pub profile_complete: bool,
    pub payout_account_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub verified: bool,
    pub profile_complete: bool,
    pub payout_account_id: Option<String>,
}

/// Database request for updating a user's marketplace attributes
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub display_name: Option<String>,
    pub verified: Option<bool>,
    pub profile_complete: Option<bool>,
    pub payout_account_id: Option<Option<String>>,
}
