//! Structured logging setup

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize the global tracing subscriber
///
/// The filter comes from `RUST_LOG` when set, otherwise from
/// `default_filter` (e.g. `"info"` or `"vantage_session=debug,info"`).
/// Calling this more than once is a no-op, so tests can call it freely.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
