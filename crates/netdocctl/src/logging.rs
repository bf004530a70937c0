//! Tracing setup for netdocctl
//!
//! Logs go to stderr so the interactive prompt on stdout stays readable.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "NETDOC_LOG";

/// Filter directive used when nothing else is configured
pub const DEFAULT_FILTER: &str = "info";

/// `--verbose` wins; otherwise `NETDOC_LOG`, otherwise `info`
pub fn build_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init_tracing(verbose: bool) {
    // try_init: a second call (tests) is a no-op
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
