//! Logging setup
//!
//! The bridge logs through `tracing` only; installing a subscriber is left to
//! the host. These helpers install the usual `fmt` subscriber.

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered at `level`
///
/// `RUST_LOG`, when set, overrides `level`. Returns `false` if a global
/// subscriber was already installed.
pub fn init_logging(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok()
}

/// Install a subscriber that writes through the test harness's capture
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}
