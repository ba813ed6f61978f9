//! Tracing subscriber setup for crawl drivers embedding this crate

use tracing_subscriber::EnvFilter;

/// Builds the log filter for a verbosity level
///
/// `quiet` wins over `verbose`. An explicit `RUST_LOG` is not consulted;
/// drivers wanting that can install their own subscriber.
pub fn log_filter(verbose: u8, quiet: bool) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }

    match verbose {
        0 => EnvFilter::new("drill_frontier=info,warn"),
        1 => EnvFilter::new("drill_frontier=debug,info"),
        2 => EnvFilter::new("drill_frontier=trace,debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Installs a global fmt subscriber
///
/// Returns false if a subscriber was already installed.
pub fn init_logging(verbose: u8, quiet: bool) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, quiet))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .try_init()
        .is_ok()
}
