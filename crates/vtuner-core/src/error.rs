//! Error types for vtuner-core.
//!
//! Per Iron Lotus Framework: All errors are explicit, no panics allowed.
//!
//! Two families live here. [`ConfigError`] is what the settings loader
//! produces and is never restartable. [`TunerError`] is everything a
//! supervision cycle can fail with; the outer driver classifies it into an
//! exit code.

use std::path::PathBuf;

/// Result type alias for supervisor operations.
pub type Result<T> = std::result::Result<T, TunerError>;

/// Failure to produce a [`Settings`](crate::config::Settings) value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The configuration path does not name an existing file.
    #[error("configuration file not found: {}", path.display())]
    NotFound {
        /// Path that was requested.
        path: PathBuf,
    },

    /// The file exists but could not be read, parsed, or validated.
    #[error("invalid configuration {}: {reason}", path.display())]
    Invalid {
        /// Path that was requested.
        path: PathBuf,
        /// Human readable reason.
        reason: String,
    },
}

impl ConfigError {
    /// Creates an invalid-configuration error.
    #[must_use]
    pub fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the file was missing (as opposed to malformed).
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Comprehensive error type for a supervision cycle.
#[derive(Debug, thiserror::Error)]
pub enum TunerError {
    /// Settings could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Persistent store could not be opened or written.
    #[error("store error: {0}")]
    Store(String),

    /// Logger could not be constructed from settings.
    #[error("logging error: {0}")]
    Logging(String),

    /// A plugin manifest could not be loaded.
    #[error("plugin error: {0}")]
    Plugin(String),

    /// A worker failed to start, run, or stop.
    #[error("worker {name} failed: {message}")]
    Worker {
        /// Worker name.
        name: String,
        /// What went wrong.
        message: String,
    },

    /// The primary worker never became ready.
    #[error("primary worker not ready after {attempts} attempts")]
    NotReady {
        /// Number of readiness probes performed.
        attempts: u32,
    },

    /// Startup task failed.
    #[error("startup task failed: {0}")]
    Startup(String),

    /// Operator interrupt observed outside a cycle's blocking wait.
    #[error("interrupted")]
    Interrupted,

    /// Invalid state for operation.
    #[error("invalid state: {0}")]
    State(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not occur in production).
    #[error("internal error: {0}")]
    Internal(String),
}

impl TunerError {
    /// Creates a store error.
    #[must_use]
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Creates a worker error.
    #[must_use]
    pub fn worker(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Worker {
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Creates a startup task error.
    #[must_use]
    pub fn startup(msg: impl Into<String>) -> Self {
        Self::Startup(msg.into())
    }

    /// Creates a state error.
    #[must_use]
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Returns true if this is a configuration loading failure.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this error stands for an operator interrupt.
    #[must_use]
    pub const fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

impl From<serde_json::Error> for TunerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::NotFound {
            path: PathBuf::from("/etc/vtuner.toml"),
        };
        assert_eq!(
            err.to_string(),
            "configuration file not found: /etc/vtuner.toml"
        );
        assert!(err.is_not_found());

        let err = ConfigError::invalid("/etc/vtuner.toml", "bad port");
        assert!(err.to_string().contains("bad port"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_config_error_is_transparent() {
        let inner = ConfigError::invalid("a.toml", "oops");
        let err = TunerError::from(inner.clone());
        assert_eq!(err.to_string(), inner.to_string());
        assert!(err.is_configuration());
        assert!(!err.is_interrupt());
    }

    #[test]
    fn test_worker_error_display() {
        let err = TunerError::worker("http", "bind failed");
        assert_eq!(err.to_string(), "worker http failed: bind failed");
    }

    #[test]
    fn test_interrupt_classification() {
        assert!(TunerError::Interrupted.is_interrupt());
        assert!(!TunerError::Interrupted.is_configuration());
        assert!(!TunerError::NotReady { attempts: 3 }.is_interrupt());
    }

    #[test]
    fn test_serde_json_conversion() {
        let err: TunerError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, TunerError::Serialization(_)));
    }
}
