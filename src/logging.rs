//! Logging Module
//!
//! Application logging setup with tracing: console output, compact
//! format, UTC timestamps.

use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the tracing subscriber.
///
/// `level` is the configured default; the `RUST_LOG` environment variable
/// takes precedence when set. Safe to call more than once (tests): a
/// subscriber that is already installed wins.
pub fn init(level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_level(true)
        .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
        .compact();

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .is_err()
    {
        debug!("Tracing subscriber already initialized, skipping");
    }
}
