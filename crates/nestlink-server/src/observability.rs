//! Tracing setup.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG` when set, otherwise falls back to the configured
/// level. Safe to call once at startup; later calls are no-ops.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
