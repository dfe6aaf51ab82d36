//! HTTP request handlers for all API endpoints.
//!
//! Each handler validates the request, checks the caller's role and
//! ownership, runs the transition through the database repositories (or the
//! coordinator/settlement entry points for multi-row transitions), and
//! serializes the response. Errors surface as [`crate::errors::Error`],
//! which converts to the right status code and JSON body.
//!
//! - [`shifts`]: posting, listing, cancellation and completion
//! - [`applications`]: submission and resolution (accept/reject/withdraw)
//! - [`bookings`]: work tracking and settlement actions
//! - [`users`]: the caller's profile and payout account
//! - [`webhooks`]: inbound payment-processor events

pub mod applications;
pub mod bookings;
pub mod shifts;
pub mod users;
pub mod webhooks;
