//! Process-wide `tracing` subscriber setup.

use tracing_subscriber::EnvFilter;

const FALLBACK_FILTER: &str = "info";

/// Installs a stderr `fmt` subscriber filtered by `directives`.
///
/// Invalid directives fall back to `info`. Calling this more than once is a no-op.
pub fn init(directives: &str) {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
