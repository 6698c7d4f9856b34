// src/logging.rs
//! Logging setup
//!
//! Log output goes to stderr so it never interleaves with the dashboard on stdout.
//! The level defaults to `info` and can be overridden with `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `verbose` raises the default level to `debug` for this crate; an explicit
/// `RUST_LOG` always wins.
pub fn init_logging(verbose: bool) {
    let default_directive = if verbose { "gps_hud=debug,info" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A second init (e.g. from tests) is not an error worth surfacing
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
