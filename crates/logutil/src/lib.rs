//! Utilities for logging.

use std::io;

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoggingMode {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Default level for a given number of `-v` flags.
pub fn level_for_verbosity(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// `RUST_LOG` takes precedence over the default level when set.
fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Initialize the global subscriber, writing to stderr.
///
/// Only the first call installs a subscriber, later calls are ignored.
pub fn init(verbosity: u8, mode: LoggingMode) {
    let level = level_for_verbosity(verbosity);
    let builder = FmtSubscriber::builder()
        .with_env_filter(env_filter(level))
        .with_writer(io::stderr);

    let _ = match mode {
        LoggingMode::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish()),
        LoggingMode::Compact => {
            tracing::subscriber::set_global_default(builder.compact().finish())
        }
        LoggingMode::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
}

/// Initialize logging for tests.
///
/// Output goes through the test writer so it is only shown for failing tests.
pub fn init_test() {
    let subscriber = FmtSubscriber::builder()
        .with_test_writer()
        .with_env_filter(env_filter(Level::DEBUG))
        .with_file(true)
        .with_line_number(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
