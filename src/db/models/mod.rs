//! Database entity models.
//!
//! These structs map directly to table rows via `sqlx::FromRow` and are the
//! types returned by the repositories in [`crate::db::handlers`]. API-facing
//! shapes live in [`crate::api::models`] and are converted from these.

pub mod applications;
pub mod bookings;
pub mod processor_events;
pub mod shifts;
pub mod users;
