//! Error types for jobflow.
//!
//! Library crates use [`JobflowError`] via `thiserror`.
//! App crates (cli/server) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all jobflow operations.
#[derive(Debug, thiserror::Error)]
pub enum JobflowError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the listing source or the sheet API.
    #[error("network error: {0}")]
    Network(String),

    /// Response body or file content could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Seen-store persistence error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Spreadsheet sink error (auth, API, or worksheet handling).
    #[error("sink error: {0}")]
    Sink(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid request or option value.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, JobflowError>;

impl JobflowError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = JobflowError::config("HOURS_OLD must be an integer");
        assert_eq!(err.to_string(), "config error: HOURS_OLD must be an integer");

        let err = JobflowError::validation("hours_old: invalid digit");
        assert!(err.to_string().contains("hours_old"));

        let err = JobflowError::Sink("HTTP 403".into());
        assert_eq!(err.to_string(), "sink error: HTTP 403");
    }

    #[test]
    fn io_error_keeps_path() {
        let err = JobflowError::io(
            "/tmp/seen.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("seen.json"));
    }
}
