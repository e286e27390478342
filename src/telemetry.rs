//! Tracing subscriber setup for binaries and examples embedding the engine.

use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber with env-filter support.
///
/// Respects `RUST_LOG`; defaults to `info` for this crate when unset. Safe to
/// call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("flowrun=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
