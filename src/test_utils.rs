//! Test utilities for integration testing (available with `test-utils` feature).

use crate::api::models::applications::AcceptResponse;
use crate::api::models::bookings::BookingResponse;
use crate::config::{AuthConfig, Config, DatabaseConfig, DummyConfig, PaymentConfig, SettlementConfig};
use crate::db::handlers::{Repository, Shifts, Users};
use crate::db::models::shifts::{ShiftCreateDBRequest, ShiftDBResponse};
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse, UserRole, UserUpdateDBRequest};
use crate::notifications::Notifier;
use crate::payment_processors::create_processor;
use crate::types::{ShiftId, UserId};
use crate::{AppState, Application, BackgroundServices};
use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn create_test_app(pool: PgPool) -> (TestServer, BackgroundServices) {
    let config = create_test_config();
    let app = Application::new_with_pool(config, pool);
    app.into_test_server()
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig {
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        },
        // Charges always succeed, webhooks accept unsigned JSON bodies
        payment: Some(PaymentConfig::Dummy(DummyConfig { simulate_failure: false })),
        settlement: SettlementConfig {
            // Tests drive settlement through the API, never the poller
            enabled: false,
            ..Default::default()
        },
        enable_metrics: false,
        ..Default::default()
    }
}

pub fn create_test_state(pool: PgPool) -> AppState {
    AppState::builder()
        .db(pool)
        .config(create_test_config())
        .processor(create_processor(Some(&PaymentConfig::Dummy(DummyConfig::default()))))
        .notifier(Notifier::disabled())
        .build()
}

/// Header pair that the trusted gateway would attach for `email`.
pub fn add_auth_headers(email: &str) -> (HeaderName, HeaderValue) {
    let header: HeaderName = AuthConfig::default().user_header.parse().expect("valid header name");
    let value = HeaderValue::from_str(email).expect("valid header value");
    (header, value)
}

pub async fn create_test_user(pool: &PgPool, role: UserRole) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let suffix = Uuid::new_v4().simple().to_string();

    let user_create = UserCreateDBRequest {
        email: format!("testuser_{suffix}@example.com"),
        display_name: "Test User".to_string(),
        role,
        verified: true,
        profile_complete: true,
        payout_account_id: None,
    };

    Users::new(&mut conn)
        .create(&user_create)
        .await
        .expect("Failed to create test user")
}

/// A provider who registered but was never vetted. Cannot apply to shifts.
pub async fn create_test_unverified_provider(pool: &PgPool) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let suffix = Uuid::new_v4().simple().to_string();

    let user_create = UserCreateDBRequest {
        email: format!("unverified_{suffix}@example.com"),
        display_name: "Unverified Provider".to_string(),
        role: UserRole::Provider,
        verified: false,
        profile_complete: true,
        payout_account_id: None,
    };

    Users::new(&mut conn)
        .create(&user_create)
        .await
        .expect("Failed to create unverified provider")
}

/// A requester who has not finished onboarding. Cannot post shifts or
/// accept applications.
pub async fn create_test_incomplete_requester(pool: &PgPool) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let suffix = Uuid::new_v4().simple().to_string();

    let user_create = UserCreateDBRequest {
        email: format!("incomplete_{suffix}@example.com"),
        display_name: "Incomplete Requester".to_string(),
        role: UserRole::Requester,
        verified: true,
        profile_complete: false,
        payout_account_id: None,
    };

    Users::new(&mut conn)
        .create(&user_create)
        .await
        .expect("Failed to create incomplete requester")
}

pub async fn set_payout_account(pool: &PgPool, user_id: UserId, account: &str) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let update = UserUpdateDBRequest {
        payout_account_id: Some(Some(account.to_string())),
        ..Default::default()
    };
    Users::new(&mut conn)
        .update(user_id, &update)
        .await
        .expect("Failed to set payout account");
}

pub async fn create_test_shift(pool: &PgPool, requester_id: UserId) -> ShiftDBResponse {
    create_test_shift_with_headcount(pool, requester_id, 1).await
}

pub async fn create_test_shift_with_headcount(pool: &PgPool, requester_id: UserId, headcount: i32) -> ShiftDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let starts_at = Utc::now() + Duration::hours(2);

    let shift_create = ShiftCreateDBRequest {
        requester_id,
        title: "Evening floor shift".to_string(),
        description: "Cover the main floor".to_string(),
        location: "Test Venue".to_string(),
        starts_at,
        ends_at: starts_at + Duration::hours(4),
        hourly_rate: Decimal::new(4000, 2), // 40.00/hour
        headcount,
    };

    Shifts::new(&mut conn)
        .create(&shift_create)
        .await
        .expect("Failed to create test shift")
}

/// Rewrite a shift's start time so check-in windows can be exercised.
pub async fn backdate_shift(pool: &PgPool, shift_id: ShiftId, starts_at: DateTime<Utc>) {
    sqlx::query("UPDATE shifts SET starts_at = $2, updated_at = now() WHERE id = $1")
        .bind(shift_id)
        .bind(starts_at)
        .execute(pool)
        .await
        .expect("Failed to backdate shift");
}

/// Walk a shift through apply and accept, returning the confirmed booking.
pub async fn create_accepted_booking(
    pool: &PgPool,
    app: &TestServer,
    requester: &UserDBResponse,
    provider: &UserDBResponse,
) -> (ShiftDBResponse, BookingResponse) {
    let shift = create_test_shift(pool, requester.id).await;

    let response = app
        .post(&format!("/api/v1/shifts/{}/applications", shift.id))
        .add_header(add_auth_headers(&provider.email).0, add_auth_headers(&provider.email).1)
        .json(&serde_json::json!({ "message": "I can cover this" }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let application: crate::api::models::applications::ApplicationResponse = response.json();

    let response = app
        .post(&format!("/api/v1/applications/{}/accept", application.id))
        .add_header(add_auth_headers(&requester.email).0, add_auth_headers(&requester.email).1)
        .await;
    response.assert_status_ok();
    let accepted: AcceptResponse = response.json();

    (shift, accepted.booking)
}
