//! Inbound payment-processor webhook.
//!
//! Events arrive with the raw body and a signature header; nothing in the
//! payload is trusted until the processor implementation verifies the
//! signature. Verified events are handed to the settlement gateway, which
//! dedups replayed deliveries against the processor-event ledger.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::{info, warn};

use crate::{
    errors::{Error, Result},
    payment_processors::ProcessorError,
    settlement::SettlementGateway,
    AppState,
};

/// Receive a payment-processor event
#[utoipa::path(
    post,
    path = "/webhooks/payments",
    tag = "webhooks",
    summary = "Receive a payment-processor event",
    description = "Signature-verified webhook endpoint. Events that fail verification are rejected with 400; verified events are applied at most once.",
    responses(
        (status = 200, description = "Event accepted"),
        (status = 400, description = "Signature verification failed or payload malformed"),
    )
)]
pub async fn payments_webhook(State(state): State<AppState>, headers: HeaderMap, body: String) -> Result<StatusCode> {
    let event = state
        .processor
        .verify_webhook(&headers, &body, state.config.settlement.webhook_tolerance)
        .map_err(|e| match e {
            ProcessorError::InvalidSignature | ProcessorError::StaleTimestamp | ProcessorError::MalformedEvent(_) => {
                warn!(error = %e, "Rejected webhook delivery");
                Error::BadRequest {
                    message: format!("Webhook rejected: {e}"),
                }
            }
            other => Error::Processor {
                message: other.to_string(),
            },
        })?;

    info!(event_id = %event.event_id, event_type = %event.event_type, "Received processor event");

    let gateway = SettlementGateway::new(state.db.clone(), state.processor.clone(), state.notifier.clone());
    gateway.reconcile(event).await?;

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use crate::db::handlers::{Bookings, Repository};
    use crate::db::models::bookings::BookingStatus;
    use crate::db::models::users::UserRole;
    use crate::test_utils::{
        add_auth_headers, backdate_shift, create_accepted_booking, create_test_app, create_test_user,
        set_payout_account,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    /// Drive a booking to checked_out with a claimed charge via the dummy processor.
    async fn settle_in_flight(
        pool: &PgPool,
        app: &axum_test::TestServer,
        requester_email: &str,
        provider_email: &str,
        booking_id: crate::types::BookingId,
        shift_id: crate::types::ShiftId,
    ) {
        backdate_shift(pool, shift_id, chrono::Utc::now() - chrono::Duration::hours(1)).await;
        for action in ["check-in", "check-out"] {
            app.post(&format!("/api/v1/bookings/{booking_id}/{action}"))
                .add_header(add_auth_headers(provider_email).0, add_auth_headers(provider_email).1)
                .await
                .assert_status_ok();
        }
        app.post(&format!("/api/v1/bookings/{booking_id}/settle"))
            .add_header(add_auth_headers(requester_email).0, add_auth_headers(requester_email).1)
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_success_event_completes_booking(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        set_payout_account(&pool, provider.id, "acct_test").await;
        let (shift, booking) = create_accepted_booking(&pool, &app, &requester, &provider).await;
        settle_in_flight(&pool, &app, &requester.email, &provider.email, booking.id, shift.id).await;

        let settled_at = chrono::Utc::now().timestamp() - 90;
        let response = app
            .post("/webhooks/payments")
            .json(&json!({
                "id": "evt_success_1",
                "type": "payment.succeeded",
                "booking_id": booking.id,
                "created": settled_at,
            }))
            .await;
        response.assert_status_ok();

        let mut conn = pool.acquire().await.unwrap();
        let completed = Bookings::new(&mut conn).get_by_id(booking.id).await.unwrap().unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);
        // Paid-at carries the processor's settlement time, not delivery time
        assert_eq!(completed.paid_at, chrono::DateTime::from_timestamp(settled_at, 0));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_replayed_event_is_idempotent(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        set_payout_account(&pool, provider.id, "acct_test").await;
        let (shift, booking) = create_accepted_booking(&pool, &app, &requester, &provider).await;
        settle_in_flight(&pool, &app, &requester.email, &provider.email, booking.id, shift.id).await;

        let event = json!({
            "id": "evt_replay_1",
            "type": "payment.succeeded",
            "booking_id": booking.id,
        });

        app.post("/webhooks/payments").json(&event).await.assert_status_ok();

        let mut conn = pool.acquire().await.unwrap();
        let after_first = Bookings::new(&mut conn).get_by_id(booking.id).await.unwrap().unwrap();
        let paid_at = after_first.paid_at.expect("paid_at set by first delivery");

        // Replay: accepted, but paid_at does not move
        app.post("/webhooks/payments").json(&event).await.assert_status_ok();

        let after_replay = Bookings::new(&mut conn).get_by_id(booking.id).await.unwrap().unwrap();
        assert_eq!(after_replay.paid_at, Some(paid_at));
        assert_eq!(after_replay.status, BookingStatus::Completed);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_failure_event_parks_booking(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;
        let requester = create_test_user(&pool, UserRole::Requester).await;
        let provider = create_test_user(&pool, UserRole::Provider).await;
        set_payout_account(&pool, provider.id, "acct_test").await;
        let (shift, booking) = create_accepted_booking(&pool, &app, &requester, &provider).await;
        settle_in_flight(&pool, &app, &requester.email, &provider.email, booking.id, shift.id).await;

        let response = app
            .post("/webhooks/payments")
            .json(&json!({
                "id": "evt_failure_1",
                "type": "payment.failed",
                "booking_id": booking.id,
                "reason": "card_declined",
            }))
            .await;
        response.assert_status_ok();

        let mut conn = pool.acquire().await.unwrap();
        let parked = Bookings::new(&mut conn).get_by_id(booking.id).await.unwrap().unwrap();
        assert_eq!(parked.status, BookingStatus::CheckedOut);
        assert_eq!(parked.payment_failure.as_deref(), Some("card_declined"));
        assert!(parked.processor_payment_id.is_none());

        // An explicit retry clears the failure and claims a fresh charge
        let response = app
            .post(&format!("/api/v1/bookings/{}/settle", booking.id))
            .add_header(add_auth_headers(&requester.email).0, add_auth_headers(&requester.email).1)
            .await;
        response.assert_status_ok();

        let retried = Bookings::new(&mut conn).get_by_id(booking.id).await.unwrap().unwrap();
        assert!(retried.payment_failure.is_none());
        assert!(retried.processor_payment_id.is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_malformed_event_is_rejected(pool: PgPool) {
        let (app, _) = create_test_app(pool).await;

        let response = app.post("/webhooks/payments").text("not json").await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_booking_is_recorded_only(pool: PgPool) {
        let (app, _) = create_test_app(pool.clone()).await;

        let response = app
            .post("/webhooks/payments")
            .json(&json!({
                "id": "evt_orphan_1",
                "type": "payment.succeeded",
                "booking_id": uuid::Uuid::new_v4(),
            }))
            .await;
        response.assert_status_ok();
    }
}
