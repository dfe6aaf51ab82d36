//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Shifts** (`/api/v1/shifts/*`): posting, listing, cancellation, completion
//! - **Applications** (`/api/v1/applications/*`): submit, accept, reject, withdraw
//! - **Bookings** (`/api/v1/bookings/*`): check-in/out, cancel, dispute, settle
//! - **Users** (`/api/v1/users/current*`): profile and payout account
//! - **Webhooks** (`/webhooks/payments`): signature-verified processor events
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`;
//! the rendered documentation is served at `/docs`.

pub mod handlers;
pub mod models;
