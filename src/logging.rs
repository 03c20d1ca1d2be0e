//! Logging initialization
//!
//! Installs a tracing subscriber with an env-filter. The embedding binary
//! owns where logs go; this helper only sets up the default compact
//! formatter and respects `RUST_LOG` overrides.

use tracing_subscriber::EnvFilter;

/// Initialize logging with the default `info` filter
pub fn init() {
    init_with_filter("info");
}

/// Initialize logging with a default filter, overridable via `RUST_LOG`
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_with_filter(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .try_init();
}
