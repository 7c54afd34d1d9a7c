//! Drain coordinator error types and handling

use crate::tracker::RequestId;

/// Result type for drain operations
pub type DrainResult<T> = Result<T, DrainError>;

/// Errors surfaced by the drain coordinator and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum DrainError {
    /// A request id was registered while already in flight
    ///
    /// Indicates a broken lifecycle integration: every request must be
    /// registered exactly once.
    #[error("Request {0} is already tracked")]
    AlreadyTracked(RequestId),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
        /// Configuration key that caused the error
        key: Option<String>,
    },

    /// The listener failed to stop accepting connections
    #[error("Listener error: {0}")]
    Listener(String),
}

impl DrainError {
    /// Create a configuration error pointing at a specific key
    pub fn configuration_with_key(message: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Create a new listener error
    pub fn listener(message: impl Into<String>) -> Self {
        Self::Listener(message.into())
    }

    /// Whether this error reports a broken register/unregister pairing
    #[must_use]
    pub const fn is_lifecycle_violation(&self) -> bool {
        matches!(self, Self::AlreadyTracked(_))
    }

    /// Get error code for logging and metrics
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyTracked(_) => "ALREADY_TRACKED",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Listener(_) => "LISTENER_ERROR",
        }
    }
}
