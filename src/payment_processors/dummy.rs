//! Dummy payment processor for development and testing.
//!
//! Charges always "succeed" with a generated payment reference (or always
//! fail when `simulate_failure` is set). Webhook bodies are accepted
//! unsigned in a simplified format, which lets integration tests drive
//! reconciliation through the real HTTP endpoint:
//!
//! ```json
//! {"id": "evt_1", "type": "payment.succeeded", "booking_id": "...", "payment_id": "...", "created": 1700000000}
//! ```
//!
//! `created` is optional unix seconds and defaults to the delivery time.

use async_trait::async_trait;
use axum::http::HeaderMap;
use std::time::Duration;
use uuid::Uuid;

use crate::config::DummyConfig;
use crate::payment_processors::{
    ChargeRef, ChargeRequest, EventKind, PaymentProcessor, ProcessorError, Result, VerifiedEvent,
};
use crate::types::BookingId;

pub struct DummyProcessor {
    config: DummyConfig,
}

impl DummyProcessor {
    pub fn new(config: DummyConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PaymentProcessor for DummyProcessor {
    async fn create_charge(&self, request: &ChargeRequest<'_>) -> Result<ChargeRef> {
        if self.config.simulate_failure {
            return Err(ProcessorError::Api("simulated decline".to_string()));
        }

        let payment_id = format!("dummy_pi_{}", Uuid::new_v4().simple());
        tracing::info!(
            payment_id,
            booking_id = %request.booking_id,
            amount_cents = request.amount_cents,
            "Dummy processor accepted charge"
        );
        Ok(ChargeRef { payment_id })
    }

    fn verify_webhook(&self, _headers: &HeaderMap, body: &str, _tolerance: Duration) -> Result<VerifiedEvent> {
        let payload: serde_json::Value =
            serde_json::from_str(body).map_err(|e| ProcessorError::MalformedEvent(e.to_string()))?;

        let event_id = payload
            .get("id")
            .and_then(|id| id.as_str())
            .ok_or_else(|| ProcessorError::MalformedEvent("missing event id".to_string()))?
            .to_string();
        let event_type = payload
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ProcessorError::MalformedEvent("missing event type".to_string()))?
            .to_string();

        let booking_id: Option<BookingId> = payload
            .get("booking_id")
            .and_then(|id| id.as_str())
            .and_then(|id| id.parse().ok());
        let payment_id = payload.get("payment_id").and_then(|id| id.as_str()).map(str::to_string);
        let created = payload
            .get("created")
            .and_then(|c| c.as_i64())
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(chrono::Utc::now);

        let kind = match event_type.as_str() {
            "payment.succeeded" => EventKind::PaymentSucceeded,
            "payment.failed" => EventKind::PaymentFailed {
                reason: payload
                    .get("reason")
                    .and_then(|r| r.as_str())
                    .unwrap_or("payment failed")
                    .to_string(),
            },
            _ => EventKind::Other,
        };

        Ok(VerifiedEvent {
            event_id,
            event_type,
            kind,
            booking_id,
            payment_id,
            created,
            payload,
        })
    }
}
