//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases for better type safety:
//!
//! - [`UserId`]: Marketplace user (provider or requester)
//! - [`ShiftId`]: Posted shift
//! - [`ApplicationId`]: Provider application to a shift
//! - [`BookingId`]: Confirmed booking created on acceptance

use uuid::Uuid;

pub type UserId = Uuid;
pub type ShiftId = Uuid;
pub type ApplicationId = Uuid;
pub type BookingId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}
