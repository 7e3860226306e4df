//! Logger configuration for the Hub console.
//!
//! Logs go to stderr so that command output on stdout stays pipeable.

use std::{io::IsTerminal, str::FromStr};

use tracing::Level;
use tracing_subscriber::{
    filter::Targets,
    layer::{Layer, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
};

/// Initialize a global `tracing` logger.
///
/// + The logger will print enabled `tracing` events and spans to stderr.
/// + The default log level includes INFO, WARN, and ERROR events, except for
///   per-request `http` logs which default to WARN.
/// + You can change the log level or module filtering with an appropriate
///   `RUST_LOG` env var set. Read more about the syntax here:
///   <https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.Targets.html>
///
/// Panics if a logger is already initialized. This will fail if used in tests,
/// since multiple test threads will compete to set the global logger.
pub fn init(default_level: Level) {
    try_init(default_level).expect("Failed to setup logger");
}

/// Use this to initialize the global logger in tests.
pub fn init_for_testing() {
    // Quickly skip logger setup if no env var set.
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }

    // Don't panic if there's already a logger setup. Multiple tests might try
    // setting the global logger.
    let _ = try_init(Level::INFO);
}

/// Try to initialize a global logger. Will return an `Err` if there is another
/// global logger already set.
pub fn try_init(default_level: Level) -> Result<(), TryInitError> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = targets_filter(rust_log.as_deref(), default_level);

    let stderr_log = tracing_subscriber::fmt::layer()
        .compact()
        .with_level(true)
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_filter(filter);

    tracing_subscriber::registry().with(stderr_log).try_init()
}

/// Parses `RUST_LOG`, falling back to `default_level` if it's unset or we
/// can't parse the targets filter.
fn targets_filter(rust_log: Option<&str>, default_level: Level) -> Targets {
    rust_log
        .and_then(|rust_log| Targets::from_str(rust_log).ok())
        .unwrap_or_else(|| {
            // `Level`s compare by verbosity, e.g. DEBUG > INFO > WARN.
            let http_level = if default_level > Level::INFO {
                default_level
            } else {
                Level::WARN.min(default_level)
            };
            Targets::new()
                .with_default(default_level)
                .with_target("http", http_level)
        })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_filter() {
        let filter = targets_filter(None, Level::INFO);
        assert!(filter.would_enable("console::channels", &Level::INFO));
        assert!(!filter.would_enable("console::channels", &Level::DEBUG));
        assert!(filter.would_enable("http", &Level::WARN));
        assert!(!filter.would_enable("http", &Level::INFO));

        // A chattier default level also opens up request logs.
        let filter = targets_filter(None, Level::DEBUG);
        assert!(filter.would_enable("http", &Level::DEBUG));

        let filter = targets_filter(None, Level::ERROR);
        assert!(!filter.would_enable("http", &Level::WARN));
    }

    #[test]
    fn rust_log_overrides_default() {
        let filter = targets_filter(Some("http=debug,warn"), Level::INFO);
        assert!(filter.would_enable("http", &Level::DEBUG));
        assert!(!filter.would_enable("console", &Level::INFO));
    }
}
