//! Stripe payment processor implementation.
//!
//! Charges are created as payment intents with `transfer_data[destination]`
//! pointing at the provider's connected account and `application_fee_amount`
//! retaining the platform fee. Webhook deliveries are verified against the
//! `stripe-signature` header scheme: an HMAC-SHA256 over `{timestamp}.{body}`
//! keyed with the endpoint's signing secret.

use async_trait::async_trait;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

use crate::config::StripeConfig;
use crate::payment_processors::{
    ChargeRef, ChargeRequest, EventKind, PaymentProcessor, ProcessorError, Result, VerifiedEvent,
};
use crate::types::BookingId;

type HmacSha256 = Hmac<Sha256>;

pub struct StripeProcessor {
    config: StripeConfig,
    client: reqwest::Client,
}

impl StripeProcessor {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    async fn create_charge(&self, request: &ChargeRequest<'_>) -> Result<ChargeRef> {
        let url = format!("{}/v1/payment_intents", self.config.api_base);

        let booking_id = request.booking_id.to_string();
        let params = [
            ("amount", request.amount_cents.to_string()),
            ("currency", "usd".to_string()),
            ("confirm", "true".to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("automatic_payment_methods[allow_redirects]", "never".to_string()),
            ("transfer_data[destination]", request.payout_account_id.to_string()),
            ("application_fee_amount", request.application_fee_cents.to_string()),
            ("metadata[booking_id]", booking_id.clone()),
            ("description", request.description.to_string()),
        ];

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            // One charge per booking: Stripe dedupes retries under this key
            .header("Idempotency-Key", format!("booking_{booking_id}"))
            .form(&params)
            .send()
            .await
            .map_err(|e| ProcessorError::Api(format!("request failed: {e}")))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProcessorError::Api(format!("invalid response body: {e}")))?;

        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            tracing::error!(%status, message, "Stripe payment intent creation failed");
            return Err(ProcessorError::Api(message.to_string()));
        }

        let payment_id = body
            .get("id")
            .and_then(|id| id.as_str())
            .ok_or_else(|| ProcessorError::Api("payment intent response missing id".to_string()))?
            .to_string();

        tracing::info!(payment_id, booking_id, "Created Stripe payment intent");
        Ok(ChargeRef { payment_id })
    }

    fn verify_webhook(&self, headers: &HeaderMap, body: &str, tolerance: Duration) -> Result<VerifiedEvent> {
        let signature_header = headers
            .get("stripe-signature")
            .and_then(|h| h.to_str().ok())
            .ok_or(ProcessorError::InvalidSignature)?;

        let (timestamp, signature) = parse_signature_header(signature_header)?;

        if !verify_signature(timestamp, body, &signature, &self.config.webhook_secret) {
            return Err(ProcessorError::InvalidSignature);
        }

        let now = chrono::Utc::now().timestamp();
        if (now - timestamp).unsigned_abs() > tolerance.as_secs() {
            return Err(ProcessorError::StaleTimestamp);
        }

        parse_event(body)
    }
}

/// Parse the `stripe-signature` header: `t=<unix seconds>,v1=<hex hmac>`.
/// Multiple `v1` entries can appear during secret rotation; the first is used.
fn parse_signature_header(header: &str) -> Result<(i64, String)> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) if signature.is_none() => signature = Some(value.to_string()),
            _ => {}
        }
    }

    match (timestamp, signature) {
        (Some(t), Some(sig)) => Ok((t, sig)),
        _ => Err(ProcessorError::InvalidSignature),
    }
}

/// Sign a payload the way Stripe does: HMAC-SHA256 over `{timestamp}.{body}`,
/// hex-encoded.
pub fn sign_payload(timestamp: i64, body: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{timestamp}.{body}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn verify_signature(timestamp: i64, body: &str, signature: &str, secret: &str) -> bool {
    let expected = sign_payload(timestamp, body, secret);
    // Constant-time comparison to prevent timing attacks
    constant_time_eq(expected.as_bytes(), signature.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

fn parse_event(body: &str) -> Result<VerifiedEvent> {
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
    // Stripe's `created` is unix seconds
    let created = payload
        .get("created")
        .and_then(|c| c.as_i64())
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(chrono::Utc::now);

    let object = payload.pointer("/data/object");
    let payment_id = object
        .and_then(|o| o.get("id"))
        .and_then(|id| id.as_str())
        .map(str::to_string);
    let booking_id: Option<BookingId> = object
        .and_then(|o| o.pointer("/metadata/booking_id"))
        .and_then(|id| id.as_str())
        .and_then(|id| id.parse().ok());

    let kind = match event_type.as_str() {
        "payment_intent.succeeded" => EventKind::PaymentSucceeded,
        "payment_intent.payment_failed" => {
            let reason = object
                .and_then(|o| o.pointer("/last_payment_error/message"))
                .and_then(|m| m.as_str())
                .unwrap_or("payment failed")
                .to_string();
            EventKind::PaymentFailed { reason }
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use uuid::Uuid;

    fn processor(secret: &str) -> StripeProcessor {
        StripeProcessor::new(StripeConfig {
            api_key: "sk_test_fake".to_string(),
            webhook_secret: secret.to_string(),
            api_base: "http://localhost:0".to_string(),
        })
    }

    fn signed_headers(timestamp: i64, body: &str, secret: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let sig = sign_payload(timestamp, body, secret);
        headers.insert(
            "stripe-signature",
            HeaderValue::from_str(&format!("t={timestamp},v1={sig}")).unwrap(),
        );
        headers
    }

    fn event_body(event_type: &str, booking_id: Uuid) -> String {
        serde_json::json!({
            "id": "evt_test_1",
            "type": event_type,
            "created": 1735000000,
            "data": {
                "object": {
                    "id": "pi_test_1",
                    "metadata": { "booking_id": booking_id.to_string() },
                    "last_payment_error": { "message": "card declined" }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn test_verify_valid_signature() {
        let secret = "whsec_test_secret";
        let booking_id = Uuid::new_v4();
        let body = event_body("payment_intent.succeeded", booking_id);
        let timestamp = chrono::Utc::now().timestamp();

        let event = processor(secret)
            .verify_webhook(&signed_headers(timestamp, &body, secret), &body, Duration::from_secs(300))
            .expect("valid signature should verify");

        assert_eq!(event.event_id, "evt_test_1");
        assert_eq!(event.kind, EventKind::PaymentSucceeded);
        assert_eq!(event.booking_id, Some(booking_id));
        assert_eq!(event.payment_id.as_deref(), Some("pi_test_1"));
        assert_eq!(event.created, chrono::DateTime::from_timestamp(1735000000, 0).unwrap());
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let booking_id = Uuid::new_v4();
        let body = event_body("payment_intent.succeeded", booking_id);
        let timestamp = chrono::Utc::now().timestamp();
        let headers = signed_headers(timestamp, &body, "whsec_other_secret");

        let result = processor("whsec_test_secret").verify_webhook(&headers, &body, Duration::from_secs(300));
        assert!(matches!(result, Err(ProcessorError::InvalidSignature)));
    }

    #[test]
    fn test_verify_rejects_tampered_body() {
        let secret = "whsec_test_secret";
        let body = event_body("payment_intent.succeeded", Uuid::new_v4());
        let timestamp = chrono::Utc::now().timestamp();
        let headers = signed_headers(timestamp, &body, secret);

        let tampered = body.replace("payment_intent.succeeded", "payment_intent.payment_failed");
        let result = processor(secret).verify_webhook(&headers, &tampered, Duration::from_secs(300));
        assert!(matches!(result, Err(ProcessorError::InvalidSignature)));
    }

    #[test]
    fn test_verify_rejects_stale_timestamp() {
        let secret = "whsec_test_secret";
        let body = event_body("payment_intent.succeeded", Uuid::new_v4());
        let timestamp = chrono::Utc::now().timestamp() - 3600;
        let headers = signed_headers(timestamp, &body, secret);

        let result = processor(secret).verify_webhook(&headers, &body, Duration::from_secs(300));
        assert!(matches!(result, Err(ProcessorError::StaleTimestamp)));
    }

    #[test]
    fn test_verify_rejects_missing_header() {
        let secret = "whsec_test_secret";
        let body = event_body("payment_intent.succeeded", Uuid::new_v4());

        let result = processor(secret).verify_webhook(&HeaderMap::new(), &body, Duration::from_secs(300));
        assert!(matches!(result, Err(ProcessorError::InvalidSignature)));
    }

    #[test]
    fn test_failed_event_carries_reason() {
        let secret = "whsec_test_secret";
        let body = event_body("payment_intent.payment_failed", Uuid::new_v4());
        let timestamp = chrono::Utc::now().timestamp();

        let event = processor(secret)
            .verify_webhook(&signed_headers(timestamp, &body, secret), &body, Duration::from_secs(300))
            .expect("valid signature should verify");

        assert_eq!(
            event.kind,
            EventKind::PaymentFailed {
                reason: "card declined".to_string()
            }
        );
    }

    #[test]
    fn test_unrelated_event_is_other() {
        let secret = "whsec_test_secret";
        let body = event_body("charge.refunded", Uuid::new_v4());
        let timestamp = chrono::Utc::now().timestamp();

        let event = processor(secret)
            .verify_webhook(&signed_headers(timestamp, &body, secret), &body, Duration::from_secs(300))
            .expect("valid signature should verify");

        assert_eq!(event.kind, EventKind::Other);
    }

    #[tokio::test]
    async fn test_create_charge_sends_connect_params() {
        use wiremock::matchers::{body_string_contains, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let booking_id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header("Idempotency-Key", format!("booking_{booking_id}").as_str()))
            .and(body_string_contains("transfer_data%5Bdestination%5D=acct_42"))
            .and(body_string_contains("application_fee_amount=600"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "pi_mock_1" })))
            .expect(1)
            .mount(&server)
            .await;

        let processor = StripeProcessor::new(StripeConfig {
            api_key: "sk_test_fake".to_string(),
            webhook_secret: "whsec_test".to_string(),
            api_base: server.uri(),
        });

        let charge = processor
            .create_charge(&ChargeRequest {
                booking_id,
                amount_cents: 3600,
                application_fee_cents: 600,
                payout_account_id: "acct_42",
                description: "Evening floor shift",
            })
            .await
            .expect("mocked charge should succeed");

        assert_eq!(charge.payment_id, "pi_mock_1");
    }

    #[tokio::test]
    async fn test_create_charge_surfaces_api_error() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
                "error": { "message": "Your card was declined." }
            })))
            .mount(&server)
            .await;

        let processor = StripeProcessor::new(StripeConfig {
            api_key: "sk_test_fake".to_string(),
            webhook_secret: "whsec_test".to_string(),
            api_base: server.uri(),
        });

        let result = processor
            .create_charge(&ChargeRequest {
                booking_id: Uuid::new_v4(),
                amount_cents: 100,
                application_fee_cents: 20,
                payout_account_id: "acct_42",
                description: "Evening floor shift",
            })
            .await;

        assert!(matches!(result, Err(ProcessorError::Api(m)) if m == "Your card was declined."));
    }

    #[test]
    fn test_signature_header_parsing() {
        let (t, sig) = parse_signature_header("t=1614265330,v1=abc123").unwrap();
        assert_eq!(t, 1614265330);
        assert_eq!(sig, "abc123");

        // Rotation: two v1 entries, first wins
        let (_, sig) = parse_signature_header("t=1,v1=first,v1=second").unwrap();
        assert_eq!(sig, "first");

        assert!(parse_signature_header("v1=missing_timestamp").is_err());
        assert!(parse_signature_header("t=1").is_err());
    }
}
