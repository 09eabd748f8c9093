//! Logging initialization.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over `-v` when set.
///
/// Logs go to stderr; stdout is reserved for chapter output.
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
