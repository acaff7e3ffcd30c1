//! Logging configuration and initialization.
//!
//! A migration run reports through tracing events only:
//!
//! - `info`: run start and finish, one progress line per top-level entity
//!   with the rolling average and ETA, created nodes, suites and plans
//! - `warn`: contained failures (abandoned tree branches, rejected
//!   configuration updates, advisory field validation, unmarked sources)
//! - `error`: save failures, followed by one event per unsaved field
//! - `debug`/`trace`: skip decisions, identity lookups and per-node sync
//!
//! Events go to stderr; `--log-file` adds a JSON copy for later inspection.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::{Mutex, Once};

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize logging for the CLI.
///
/// Logging honors `RUST_LOG` if set; otherwise a default filter is used based
/// on verbosity and quiet flags. When `log_file` is given, a JSON copy of every
/// event is written there as well.
///
/// # Errors
///
/// Returns an error if the filter is invalid, the log file cannot be created,
/// or a global subscriber is already installed.
pub fn init_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(verbosity, quiet)))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity > 0)
        .with_level(true)
        .with_file(cfg!(debug_assertions) && verbosity > 1)
        .with_line_number(cfg!(debug_assertions) && verbosity > 1)
        .with_ansi(std::io::stderr().is_terminal());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if let Some(path) = log_file {
        let file = std::fs::File::create(path)?;
        let file_layer = fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .json();
        tracing::subscriber::set_global_default(subscriber.with(file_layer))?;
    } else {
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

fn default_filter(verbosity: u8, quiet: bool) -> String {
    if quiet {
        return "error".to_string();
    }

    match verbosity {
        0 => "wit_migrate=info".to_string(),
        1 => "wit_migrate=debug".to_string(),
        2 => "wit_migrate=debug,wit_migrate::sync=trace".to_string(),
        _ => "wit_migrate=trace".to_string(),
    }
}

/// Initialize logging for tests with the test writer.
pub fn init_test_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("wit_migrate=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_overrides_verbosity() {
        assert_eq!(default_filter(3, true), "error");
    }

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(default_filter(0, false), "wit_migrate=info");
        assert_eq!(default_filter(1, false), "wit_migrate=debug");
        assert_eq!(
            default_filter(2, false),
            "wit_migrate=debug,wit_migrate::sync=trace"
        );
        assert_eq!(default_filter(9, false), "wit_migrate=trace");
    }
}
