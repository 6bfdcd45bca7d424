use thiserror::Error;

/// Core error types for nestlink domain operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid invite code format")]
    InvalidCodeFormat,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported invite duration: {0} days")]
    UnsupportedDuration(i64),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("UUID error: {0}")]
    UuidError(#[from] uuid::Error),
}

impl CoreError {
    /// Create a new `InvalidArgument` error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Check if this error is caused by malformed caller input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCodeFormat | Self::InvalidArgument(_) | Self::UnsupportedDuration(_)
        )
    }
}

/// Convenience result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
