//! Logging setup for the agent daemon.
//!
//! The effective level comes from three places, strongest first: `-v` flags
//! on the command line, the `RUST_LOG` environment variable, then the config
//! file (already merged with `CORVID_LOG_LEVEL` by the config loader).
//! `main` resolves that order with [`verbosity_level`] and calls [`init`]
//! exactly once.

use std::path::Path;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::error::AgentError;

/// Map a count of `-v` flags to a level directive, one tier per flag.
///
/// Zero flags returns `None`: the config file (or `RUST_LOG`) decides.
pub fn verbosity_level(flags: u8) -> Option<&'static str> {
    match flags {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Install the global tracing subscriber, writing to stderr or, when
/// `log_file` is given, appending to that file (daemon runs).
///
/// With `level_is_forced` (a `-v` flag was passed) `level` wins outright;
/// otherwise `RUST_LOG` takes priority and `level` is the config-file
/// fallback.
pub fn init(level: &str, level_is_forced: bool, log_file: Option<&Path>) -> Result<(), AgentError> {
    let filter = build_filter(level, level_is_forced)?;

    let writer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AgentError::Logger(format!("cannot open log file '{}': {e}", path.display()))
                })?;
            BoxMakeWriter::new(file)
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .try_init()
        .map_err(|e| AgentError::Logger(format!("subscriber already installed: {e}")))?;

    Ok(())
}

fn build_filter(level: &str, level_is_forced: bool) -> Result<EnvFilter, AgentError> {
    if level_is_forced {
        // Levels from the -v tier table are always valid; anything else
        // reaching here is a bug worth surfacing.
        return EnvFilter::try_new(level)
            .map_err(|e| AgentError::Logger(format!("invalid forced log level '{level}': {e}")));
    }

    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return Ok(env_filter);
    }

    EnvFilter::try_new(level)
        .map_err(|e| AgentError::Logger(format!("invalid log level '{level}' in config: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_tiers() {
        assert_eq!(verbosity_level(0), None);
        assert_eq!(verbosity_level(1), Some("warn"));
        assert_eq!(verbosity_level(2), Some("info"));
        assert_eq!(verbosity_level(3), Some("debug"));
        assert_eq!(verbosity_level(4), Some("trace"));
        // Extra flags saturate at trace.
        assert_eq!(verbosity_level(200), Some("trace"));
    }

    #[test]
    fn forced_garbage_level_is_rejected() {
        let err = build_filter("louder-please", true).unwrap_err();
        assert!(err.to_string().contains("louder-please"));
    }

    #[test]
    fn config_levels_accepted_as_fallback() {
        for level in ["error", "warn", "info", "debug", "trace"] {
            assert!(build_filter(level, false).is_ok(), "'{level}' must parse");
        }
    }

    #[test]
    fn init_tolerates_a_prior_subscriber() {
        // Another test may have installed the global subscriber first.
        match init("info", true, None) {
            Ok(()) => {}
            Err(AgentError::Logger(msg)) if msg.contains("already installed") => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
