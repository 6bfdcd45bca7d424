//! HTTP error mapping.
//!
//! Responses carry only the taxonomy label and a fixed human-readable
//! message; internal ids, driver errors and stack traces stay in the
//! logs.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use nestlink_invites::InviteError;

/// HTTP-facing error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("Not found")]
    NotFound,
    /// 409 with a machine-readable reason; the redemption failure shape.
    #[error("Conflict: {code}")]
    Conflict {
        code: &'static str,
        message: &'static str,
    },
    #[error("Service unavailable")]
    Unavailable,
    #[error("Internal server error")]
    Internal,
}

/// Wire shape of every error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::BadRequest(msg) => ErrorBody {
                error: "invalid_argument".to_string(),
                message: msg.clone(),
            },
            Self::Unauthorized => ErrorBody {
                error: "unauthorized".to_string(),
                message: "Authentication required.".to_string(),
            },
            Self::Forbidden => ErrorBody {
                error: "forbidden".to_string(),
                message: "You are not allowed to manage this invite.".to_string(),
            },
            Self::NotFound => ErrorBody {
                error: "not_found".to_string(),
                message: "No such invite.".to_string(),
            },
            Self::Conflict { code, message } => ErrorBody {
                error: (*code).to_string(),
                message: (*message).to_string(),
            },
            Self::Unavailable => ErrorBody {
                error: "store_unavailable".to_string(),
                message: "Something went wrong. Please try again.".to_string(),
            },
            Self::Internal => ErrorBody {
                error: "internal".to_string(),
                message: "Something went wrong. Please try again.".to_string(),
            },
        }
    }

    /// Map a redemption failure onto the 409 contract of
    /// `POST /invites/redeem`.
    pub fn from_redemption(err: InviteError) -> Self {
        match err {
            InviteError::InvalidArgument(msg) => Self::BadRequest(msg),
            InviteError::NotFoundOrInvalid
            | InviteError::Expired
            | InviteError::Revoked
            | InviteError::MaxUsesReached => Self::Conflict {
                code: err.code(),
                message: err.user_message(),
            },
            other => Self::from(other),
        }
    }
}

impl From<InviteError> for ApiError {
    fn from(err: InviteError) -> Self {
        match err {
            InviteError::InvalidArgument(msg) => Self::BadRequest(msg),
            InviteError::NotFoundOrInvalid => Self::NotFound,
            InviteError::Forbidden => Self::Forbidden,
            InviteError::Expired | InviteError::Revoked | InviteError::MaxUsesReached => {
                Self::Conflict {
                    code: err.code(),
                    message: err.user_message(),
                }
            }
            InviteError::StoreUnavailable(ref cause) => {
                tracing::error!(error = %cause, "Storage failure");
                Self::Unavailable
            }
            InviteError::GenerationExhausted { .. } => {
                // Already logged as an operational alarm by the issuer.
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redemption_failures_are_conflicts() {
        let err = ApiError::from_redemption(InviteError::MaxUsesReached);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(matches!(
            err,
            ApiError::Conflict {
                code: "max_uses_reached",
                ..
            }
        ));

        let err = ApiError::from_redemption(InviteError::NotFoundOrInvalid);
        assert!(matches!(err, ApiError::Conflict { code: "invalid", .. }));
    }

    #[test]
    fn test_generic_mapping() {
        assert_eq!(
            ApiError::from(InviteError::Forbidden).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(InviteError::NotFoundOrInvalid).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(InviteError::GenerationExhausted { attempts: 3 }).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_bodies_leak_no_internals() {
        let err = ApiError::from(InviteError::StoreUnavailable(
            nestlink_storage::StorageError::database("SELECT failed on 10.1.2.3"),
        ));
        let body = serde_json::to_string(&err.body()).unwrap();
        assert!(!body.contains("10.1.2.3"));
        assert!(!body.contains("SELECT"));
    }
}
