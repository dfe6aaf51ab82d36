//! API request and response data models.
//!
//! These structures define the public HTTP contract. They are distinct from
//! the database models so the wire format and the storage representation can
//! evolve independently; all of them carry `utoipa` annotations so the
//! OpenAPI document stays in sync.
//!
//! - [`users`]: user profiles and the authenticated [`users::CurrentUser`]
//! - [`shifts`]: shift postings and listing filters
//! - [`applications`]: provider applications and the accept outcome
//! - [`bookings`]: bookings with their recorded earnings
//! - [`pagination`]: shared offset pagination parameters

pub mod applications;
pub mod bookings;
pub mod pagination;
pub mod shifts;
pub mod users;
