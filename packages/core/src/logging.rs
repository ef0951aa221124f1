//! Tracing setup for binaries and tests embedding the core.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the host. [`init_tracing`] installs the usual `fmt`
//! subscriber filtered by `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `default_directive`
/// (e.g. `"info"` or `"jobboard_core=debug"`). Returns `false` if a global
/// subscriber was already installed, so calling this more than once is
/// harmless.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
