//! Payment processor abstraction layer.
//!
//! This module defines the `PaymentProcessor` trait which abstracts the
//! destination-charge and webhook-verification functionality across payment
//! processors. The real implementation talks to Stripe Connect; the dummy
//! one is for development and tests.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::config::PaymentConfig;
use crate::types::BookingId;

pub mod dummy;
pub mod stripe;

/// Create a payment processor from configuration.
///
/// This is the single point where config turns into processor instances.
/// Adding a new processor requires adding a match arm here. Without any
/// payment config the dummy processor is used, so development setups work
/// out of the box.
pub fn create_processor(config: Option<&PaymentConfig>) -> Arc<dyn PaymentProcessor> {
    match config {
        Some(PaymentConfig::Stripe(stripe_config)) => Arc::new(stripe::StripeProcessor::new(stripe_config.clone())),
        Some(PaymentConfig::Dummy(dummy_config)) => Arc::new(dummy::DummyProcessor::new(dummy_config.clone())),
        None => Arc::new(dummy::DummyProcessor::new(Default::default())),
    }
}

/// Result type for payment processor operations
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Errors that can occur during payment processing
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Payment processor API error: {0}")]
    Api(String),

    #[error("Webhook signature verification failed")]
    InvalidSignature,

    #[error("Webhook timestamp outside tolerance window")]
    StaleTimestamp,

    #[error("Malformed webhook event: {0}")]
    MalformedEvent(String),
}

/// A destination charge to run for a settled booking: the requester total is
/// collected, the platform fee is retained, and the remainder is transferred
/// to the provider's payout account.
#[derive(Debug, Clone)]
pub struct ChargeRequest<'a> {
    pub booking_id: BookingId,
    /// Total charged to the requester, in cents
    pub amount_cents: i64,
    /// Platform fee retained from the charge, in cents
    pub application_fee_cents: i64,
    /// Provider's payout account at the processor
    pub payout_account_id: &'a str,
    pub description: &'a str,
}

/// Reference to a charge created at the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRef {
    pub payment_id: String,
}

/// Outcome a webhook event reports for a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    PaymentSucceeded,
    PaymentFailed { reason: String },
    /// Event types settlement does not act on
    Other,
}

/// A webhook event whose signature has been verified.
#[derive(Debug, Clone)]
pub struct VerifiedEvent {
    /// Processor-assigned event id, used for idempotent recording
    pub event_id: String,
    pub event_type: String,
    pub kind: EventKind,
    /// Booking the event refers to, recovered from charge metadata
    pub booking_id: Option<BookingId>,
    /// Processor payment reference the event refers to
    pub payment_id: Option<String>,
    /// When the processor created the event. A succeeded event's time
    /// becomes the booking's paid-at timestamp.
    pub created: DateTime<Utc>,
    /// Full event body, stored alongside the ledger entry
    pub payload: serde_json::Value,
}

/// Abstract payment processor interface
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a destination charge for a checked-out booking.
    ///
    /// Implementations must be idempotent per booking: retrying after a
    /// network failure must not double-charge the requester.
    async fn create_charge(&self, request: &ChargeRequest<'_>) -> Result<ChargeRef>;

    /// Verify a webhook delivery and extract the event it carries.
    ///
    /// Fails with [`ProcessorError::InvalidSignature`] on a bad signature and
    /// [`ProcessorError::StaleTimestamp`] when the signed timestamp falls
    /// outside the tolerance window.
    fn verify_webhook(&self, headers: &HeaderMap, body: &str, tolerance: Duration) -> Result<VerifiedEvent>;
}
