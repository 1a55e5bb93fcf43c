// Error types for the batch executor
//
// Command and exhaustion failures are not errors here: they are contained by
// the retry engine and surface only through the failure log and counters.

use std::path::PathBuf;

use thiserror::Error;

use crate::report::{EXIT_CONFIG_ERROR, EXIT_RUN_ERROR};

/// Result type alias for executor operations
pub type Result<T> = std::result::Result<T, RunError>;

/// Fatal problems detected before any work starts
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Input file does not exist
    #[error("commands file not found: {0}")]
    InputNotFound(PathBuf),

    /// Input file exists but holds no commands
    #[error("commands file contains no commands: {0}")]
    EmptyInput(PathBuf),

    /// A line could not be turned into an invocation
    #[error("invalid command on line {line}: {reason}")]
    InvalidCommand { line: usize, reason: String },

    /// A numeric or path setting is out of range
    #[error("invalid setting '{name}': {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    /// Input could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Create an invalid setting error
    pub fn setting(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidSetting {
            name,
            reason: reason.into(),
        }
    }
}

/// Failure log errors
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Sink could not be created or written
    #[error("failure log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Collector task ended without returning the log
    #[error("failure log collector terminated unexpectedly: {0}")]
    CollectorLost(String),
}

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration or input error, no work was started
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Failure log could not be set up or collected
    #[error("failure recorder error: {0}")]
    Recorder(#[from] RecorderError),

    /// Summary file could not be written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    /// True for errors raised before partitioning
    pub fn is_config(&self) -> bool {
        matches!(self, RunError::Config(_))
    }

    /// Process exit status for a run that aborted with this error
    ///
    /// Kept apart from the command-failure status so callers can tell a broken
    /// failure log from exhausted commands.
    pub fn exit_status(&self) -> i32 {
        match self {
            RunError::Config(_) => EXIT_CONFIG_ERROR,
            RunError::Recorder(_) | RunError::Io(_) => EXIT_RUN_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidCommand {
            line: 4,
            reason: "unterminated quote".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid command on line 4: unterminated quote"
        );

        let err = ConfigError::setting("worker_count", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid setting 'worker_count': must be at least 1"
        );
    }

    #[test]
    fn test_run_error_is_config() {
        let err: RunError = ConfigError::EmptyInput(PathBuf::from("x.txt")).into();
        assert!(err.is_config());

        let err: RunError = RecorderError::CollectorLost("panic".into()).into();
        assert!(!err.is_config());
    }

    #[test]
    fn test_run_error_exit_status() {
        let err: RunError = ConfigError::setting("worker_count", "zero").into();
        assert_eq!(err.exit_status(), EXIT_CONFIG_ERROR);

        let err: RunError =
            RecorderError::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied)).into();
        assert_eq!(err.exit_status(), EXIT_RUN_ERROR);
        assert_ne!(err.exit_status(), crate::report::EXIT_COMMAND_FAILURES);
    }
}
