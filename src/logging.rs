//! Logging setup: an `EnvFilter`-driven `tracing-subscriber` fmt layer,
//! installed once from the binary entry point.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber reading its level from
/// `RUST_LOG`, defaulting to `info` when unset. Component boundaries use
/// `info!`/`debug!`/`warn!`/`trace!` at the points the teacher instruments
/// its own simulation loop: iteration boundaries, per-agent admission
/// retries, reducer skip-on-malformed-log.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
