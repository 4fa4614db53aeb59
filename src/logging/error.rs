//! Error types for the rotation engine and formatter

use std::path::PathBuf;

/// Errors raised while building or driving a log sink
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Ambiguous or invalid setup; fatal at construction
    #[error("Log configuration error: {0}")]
    Configuration(String),

    /// The active file could not be opened, reopened or written
    #[error("Failed to rotate log file {}: {source}", path.display())]
    Rotation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stale file could not be removed during a retention sweep
    #[error("Failed to delete stale log file {}: {source}", path.display())]
    RetentionSweep {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the logging module
pub type Result<T> = std::result::Result<T, LogError>;

impl LogError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        LogError::Configuration(msg.into())
    }

    pub fn rotation(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LogError::Rotation {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LogError::config("no log type in \"app.log\"");
        assert_eq!(
            err.to_string(),
            "Log configuration error: no log type in \"app.log\""
        );
    }

    #[test]
    fn test_rotation_error_keeps_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = LogError::rotation("/var/log/2026-01-01.error.log", io_err);
        assert!(err.to_string().contains("2026-01-01.error.log"));
        assert!(matches!(err, LogError::Rotation { .. }));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: LogError = io_err.into();
        assert!(matches!(err, LogError::Io(_)));
    }
}
