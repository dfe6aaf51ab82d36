//! Tracing initialization (fmt subscriber with env-filter).
//!
//! Log levels are controlled via `RUST_LOG`, defaulting to `info` when unset:
//!
//! ```bash
//! RUST_LOG=shiftctl=debug,sqlx=warn shiftctl
//! ```

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize tracing with console output.
///
/// Safe to call once at startup. Returns an error if a global subscriber
/// is already installed.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    info!("Telemetry initialized");
    Ok(())
}
