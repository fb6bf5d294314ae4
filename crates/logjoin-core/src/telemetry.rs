//! Structured logging setup for binaries and test harnesses embedding this
//! crate. `logjoin-core` itself only ever calls into `tracing`'s macros; it
//! never installs a global subscriber on its own.

use tracing_subscriber::EnvFilter;

/// Install a `tracing_subscriber::fmt` subscriber as the global default.
///
/// Honors `RUST_LOG` if set; otherwise falls back to `default_level`
/// (e.g. `"info"`). Safe to call more than once — a subscriber already
/// installed elsewhere is left in place.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
