//! Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber at `level`.
///
/// `RUST_LOG`, when set, takes precedence over `level`. Calling this twice leaves
/// the first subscriber in place.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
