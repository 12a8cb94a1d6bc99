//! Application-wide error types.
//!
//! [`AgentError`] covers startup and session-fatal failures — the only errors
//! allowed to terminate the process.  Request-level failures use
//! [`RequestError`] / [`DispatchError`] and are always reflected on the wire
//! or in the spool instead of propagating.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("spool error: {0}")]
    Spool(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// An action-level failure raised by a module.
///
/// Turned into an RPC error response and recorded in the job's spool entry;
/// never escapes a worker.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("invalid action params: {0}")]
    InvalidParams(String),

    /// A subprocess-backed action exited non-zero or produced unusable
    /// output.  Carries the captured streams so the spool can keep them.
    #[error("{description}")]
    Execution {
        description: String,
        stdout: String,
        stderr: String,
    },

    #[error("{0}")]
    Failed(String),
}

/// Inability to dispatch a non-blocking request before a worker exists.
///
/// Reported in the provisional response with `success=false`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to create job directory '{dir}': {source}")]
    JobDir {
        dir: String,
        source: std::io::Error,
    },

    #[error("failed to start action task: {0}")]
    Spawn(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AgentError::Config("missing field".into());
        assert!(e.to_string().contains("missing field"));
        assert!(e.to_string().starts_with("config error"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: AgentError = io_err.into();
        assert!(e.to_string().contains("io error"));
        let _: &dyn Error = &e;
    }

    #[test]
    fn request_error_keeps_description() {
        let e = RequestError::Execution {
            description: "exit status 2: bad input".into(),
            stdout: String::new(),
            stderr: "bad input".into(),
        };
        assert_eq!(e.to_string(), "exit status 2: bad input");
    }

    #[test]
    fn dispatch_error_names_directory() {
        let e = DispatchError::JobDir {
            dir: "/spool/abc".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.to_string().contains("/spool/abc"));
    }
}
