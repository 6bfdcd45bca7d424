//! The invite error taxonomy.
//!
//! A closed set of variants so callers handle every case exhaustively.
//! User-visible output is limited to [`InviteError::code`] and
//! [`InviteError::user_message`]; internal ids and driver errors never
//! leave this crate through those accessors.

use thiserror::Error;

use nestlink_storage::StorageError;

/// Errors from the invite services.
#[derive(Debug, Error)]
pub enum InviteError {
    /// Malformed input; a caller bug, not retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Generic "can't use this token". The only failure unauthenticated
    /// callers ever see, covering absent, malformed, expired, revoked
    /// and exhausted tokens alike.
    #[error("Invite not found or not usable")]
    NotFoundOrInvalid,

    /// Token past its expiry. Authenticated redemption contexts only.
    #[error("Invite expired")]
    Expired,

    /// Token revoked by its issuer. Authenticated redemption contexts only.
    #[error("Invite revoked")]
    Revoked,

    /// Usage quota spent. Authenticated redemption contexts only.
    #[error("Invite quota exhausted")]
    MaxUsesReached,

    /// Caller is neither the issuer nor an administrator.
    #[error("Not allowed to manage this invite")]
    Forbidden,

    /// Code generation kept colliding. Operational alarm; should never
    /// occur at sane issuance volumes.
    #[error("Invite code generation exhausted after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },

    /// Transient storage failure; safe to retry with backoff.
    #[error("Storage unavailable")]
    StoreUnavailable(#[source] StorageError),
}

impl InviteError {
    /// Create an `InvalidArgument` error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Stable machine-readable label, used as the wire `error` field.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFoundOrInvalid => "invalid",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::MaxUsesReached => "max_uses_reached",
            Self::Forbidden => "forbidden",
            Self::GenerationExhausted { .. } => "generation_exhausted",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }

    /// Fixed human-readable remediation message. Never interpolates
    /// internal state.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "The request was malformed.",
            Self::NotFoundOrInvalid => "This invite link is not valid.",
            Self::Expired => "This invite has expired. Ask the issuer for a new invite.",
            Self::Revoked => "This invite was cancelled.",
            Self::MaxUsesReached => "This invite is no longer available.",
            Self::Forbidden => "You are not allowed to manage this invite.",
            Self::GenerationExhausted { .. } | Self::StoreUnavailable(_) => {
                "Something went wrong. Please try again."
            }
        }
    }

    /// Returns `true` if retrying may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<StorageError> for InviteError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => Self::NotFoundOrInvalid,
            StorageError::InvalidInput(msg) => Self::InvalidArgument(msg),
            // Driver, serialization and conflict failures all collapse
            // into the transient bucket; specifics stay in the log.
            other => Self::StoreUnavailable(other),
        }
    }
}

/// Result type for invite operations.
pub type InviteResult<T> = Result<T, InviteError>;
