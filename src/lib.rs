//! # shiftctl: Shift Marketplace Booking & Settlement
//!
//! `shiftctl` is the transactional core of a shift marketplace: it takes a
//! posted shift from provider application through capacity-checked booking to
//! settled payment. Identity is handled upstream; an authenticating gateway
//! forwards the caller's email in a trusted header and this service enforces
//! the marketplace rules.
//!
//! ## Overview
//!
//! Requesters post shifts with an hourly rate and a headcount. Verified
//! providers apply; the requester accepts applications one at a time, and
//! each acceptance atomically creates a confirmed booking, re-counts the
//! shift's capacity, and when the last slot fills it flips the shift to
//! `filled` and rejects every remaining pending application in the same
//! transaction. Providers check in and out of their bookings; check-out
//! prices the worked time in quarter-hour units through the rate engine and
//! freezes the payout, platform fee and requester total on the booking row.
//! A background poller (and an explicit retry endpoint) then drives each
//! checked-out booking through the payment processor as a destination
//! charge, and signature-verified webhooks complete or fail the booking
//! exactly once.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) exposes the REST surface under `/api/v1` plus
//! the processor webhook at `/webhooks/payments`. The **database layer**
//! ([`db`]) uses the repository pattern with guarded status transitions, so
//! every state machine step is a single conditional `UPDATE`. The
//! **coordinator** ([`coordinator`]) owns the multi-row accept and cancel
//! transactions. The **rate engine** ([`rates`]) is pure and clock-free. The
//! **settlement gateway** ([`settlement`]) talks to the configured
//! [`payment_processors`] implementation and reconciles webhook events
//! against a dedup ledger.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use shiftctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = shiftctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     shiftctl::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{debug, info, instrument, Level};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub mod api;
pub mod auth;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod errors;
pub mod notifications;
pub mod openapi;
pub mod payment_processors;
pub mod rates;
pub mod settlement;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::Config;
use notifications::Notifier;
use openapi::ApiDoc;
use payment_processors::PaymentProcessor;
use settlement::SettlementGateway;

/// Shared state available to all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .processor(processor)
///     .notifier(notifier)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub processor: Arc<dyn PaymentProcessor>,
    pub notifier: Notifier,
}

/// Get the shiftctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Build the application router with all endpoints and middleware.
///
/// - Marketplace API nested under `/api/v1`
/// - Processor webhook at `/webhooks/payments` (outside the versioned API)
/// - Health check at `/healthz`, docs at `/docs`
/// - Optional Prometheus metrics at `/internal/metrics`
/// - Tracing middleware on everything
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> Router {
    let api_routes = Router::new()
        .route("/shifts", post(api::handlers::shifts::create_shift))
        .route("/shifts", get(api::handlers::shifts::list_shifts))
        .route("/shifts/{id}", get(api::handlers::shifts::get_shift))
        .route("/shifts/{id}/cancel", post(api::handlers::shifts::cancel_shift))
        .route("/shifts/{id}/complete", post(api::handlers::shifts::complete_shift))
        .route(
            "/shifts/{id}/applications",
            post(api::handlers::applications::submit_application),
        )
        .route(
            "/shifts/{id}/applications",
            get(api::handlers::applications::list_shift_applications),
        )
        .route("/applications", get(api::handlers::applications::list_my_applications))
        .route(
            "/applications/{id}/accept",
            post(api::handlers::applications::accept_application),
        )
        .route(
            "/applications/{id}/reject",
            post(api::handlers::applications::reject_application),
        )
        .route(
            "/applications/{id}/withdraw",
            post(api::handlers::applications::withdraw_application),
        )
        .route("/bookings", get(api::handlers::bookings::list_bookings))
        .route("/bookings/{id}", get(api::handlers::bookings::get_booking))
        .route("/bookings/{id}/check-in", post(api::handlers::bookings::check_in))
        .route("/bookings/{id}/check-out", post(api::handlers::bookings::check_out))
        .route("/bookings/{id}/cancel", post(api::handlers::bookings::cancel_booking))
        .route("/bookings/{id}/dispute", post(api::handlers::bookings::dispute_booking))
        .route("/bookings/{id}/settle", post(api::handlers::bookings::settle_booking))
        .route("/users/current", get(api::handlers::users::get_current_user))
        .route(
            "/users/current/payout-account",
            patch(api::handlers::users::update_payout_account),
        )
        .with_state(state.clone());

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        // Webhook route (external services, not part of the client API)
        .route("/webhooks/payments", post(api::handlers::webhooks::payments_webhook))
        .with_state(state.clone())
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// Container for background services and their lifecycle management.
///
/// Currently this holds the settlement poller. When dropped, the `drop_guard`
/// cancels the shutdown token, signaling the tasks to stop.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: tokio_util::sync::CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<tokio_util::sync::DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();

        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

fn setup_background_services(state: &AppState, shutdown_token: tokio_util::sync::CancellationToken) -> BackgroundServices {
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    if state.config.settlement.enabled {
        let gateway = SettlementGateway::new(state.db.clone(), state.processor.clone(), state.notifier.clone());
        let settlement_config = state.config.settlement.clone();
        let poller_shutdown = shutdown_token.clone();
        let handle = tokio::spawn(async move {
            settlement::run_settlement_poller(gateway, settlement_config, poller_shutdown).await;
        });
        background_tasks.push(handle);
    } else {
        info!("Settlement poller disabled by configuration");
    }

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs
///    migrations, and starts background services
/// 2. **Serve**: [`Application::serve`] binds a TCP port and handles requests
/// 3. **Shutdown**: on the shutdown signal, stops the poller and closes the pool
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting shiftctl with configuration: {:#?}", config);

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .connect(&config.database.url)
            .await?;
        migrator().run(&pool).await?;

        Ok(Self::new_with_pool(config, pool))
    }

    /// Create an application over an existing pool (migrations already run).
    pub fn new_with_pool(config: Config, pool: PgPool) -> Self {
        let processor = payment_processors::create_processor(config.payment.as_ref());
        let notifier = Notifier::new(&config.notifications);

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .processor(processor)
            .notifier(notifier)
            .build();

        let shutdown_token = tokio_util::sync::CancellationToken::new();
        let bg_services = setup_background_services(&state, shutdown_token);

        let router = build_router(&state);

        Self {
            router,
            config,
            pool,
            bg_services,
        }
    }

    /// Convert the application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("shiftctl listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.bg_services.shutdown().await;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
