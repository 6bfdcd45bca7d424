use thiserror::Error;

/// Errors reported by invite storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying driver or connection failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Requested record was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness constraint violation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backend temporarily unreachable; safe to retry with backoff.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    // -------------------------------------------------------------------------
    // Constructor Methods
    // -------------------------------------------------------------------------

    /// Create a `Database` error.
    #[must_use]
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(record: impl Into<String>) -> Self {
        Self::NotFound(record.into())
    }

    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    // -------------------------------------------------------------------------
    // Predicate Methods
    // -------------------------------------------------------------------------

    /// Returns `true` if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if retrying the operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
