//! Opt-in log output.
//!
//! The library only emits `tracing` events and spans (`dispatch` with `provider`,
//! `operation` and `mode` fields). Applications that have no subscriber of their own can
//! install a formatted one here; `RUST_LOG` controls the filter.

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `RUST_LOG`, falling back to `info`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing() -> bool {
    init_tracing_with("info")
}

/// Like [`init_tracing`], with `fallback` used when `RUST_LOG` is unset or invalid.
pub fn init_tracing_with(fallback: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
