//! Token classification.
//!
//! Classifies a presented token into a definite state. Two projections
//! exist:
//!
//! - [`TokenValidator::classify`] names the specific state; reserved for
//!   authenticated contexts (the redemption flow, the issuer view).
//! - [`TokenValidator::classify_public`] collapses every non-valid state
//!   into one generic answer for unauthenticated preview calls, so
//!   probing responses never reveal whether a token exists, expired, was
//!   revoked or ran out of uses.
//!
//! Both paths perform exactly one indexed storage lookup, including for
//! malformed input (a fixed well-formed probe code is looked up
//! instead), keeping cost comparable across branches.

use std::sync::{Arc, OnceLock};

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use nestlink_core::{InviteCode, ResourcePreview, TokenState};
use nestlink_storage::InviteStorage;

use crate::directory::SharedDirectory;
use crate::error::InviteResult;

/// Probe code used to equalize the storage cost of the malformed-input
/// branch. Generated once per process; its value never matters, only
/// that looking it up costs the same as any other miss.
fn probe_code() -> &'static InviteCode {
    static PROBE: OnceLock<InviteCode> = OnceLock::new();
    PROBE.get_or_init(InviteCode::generate)
}

/// Full classification of a presented token.
#[derive(Debug, Clone)]
pub struct Classification {
    pub state: TokenState,
    /// Resource preview; present only when the state is `Valid`.
    pub preview: Option<ResourcePreview>,
    /// Internal token id; present for any stored token. Never exposed
    /// through the public projection.
    pub token_id: Option<Uuid>,
}

/// Unauthenticated projection: valid or generically invalid.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_preview: Option<ResourcePreview>,
    /// Always the single generic label when invalid, regardless of the
    /// underlying cause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// Read-only token classification service.
pub struct TokenValidator {
    storage: Arc<dyn InviteStorage>,
    directory: SharedDirectory,
}

impl TokenValidator {
    #[must_use]
    pub fn new(storage: Arc<dyn InviteStorage>, directory: SharedDirectory) -> Self {
        Self { storage, directory }
    }

    /// Classify a raw token string.
    ///
    /// # Errors
    ///
    /// Only storage failures; every token condition is a state, not an
    /// error.
    pub async fn classify(&self, raw: &str) -> InviteResult<Classification> {
        let (code, malformed) = match InviteCode::parse(raw) {
            Ok(code) => (code, false),
            // Malformed input still pays for one lookup so the response
            // cost matches the well-formed-but-absent case.
            Err(_) => (probe_code().clone(), true),
        };

        let token = self.storage.find_by_code(&code).await?;

        let Some(token) = token.filter(|_| !malformed) else {
            return Ok(Classification {
                state: TokenState::NotFound,
                preview: None,
                token_id: None,
            });
        };

        let now = OffsetDateTime::now_utc();
        let state = token.state_at(now);
        let preview = if state == TokenState::Valid {
            self.directory.preview(token.resource_id).await
        } else {
            None
        };

        Ok(Classification {
            state,
            preview,
            token_id: Some(token.id),
        })
    }

    /// Classify for an unauthenticated caller.
    ///
    /// Collapses `NotFound`, `Expired`, `Revoked` and `Exhausted` into
    /// one generic invalid answer.
    pub async fn classify_public(&self, raw: &str) -> InviteResult<PublicValidation> {
        let classification = self.classify(raw).await?;
        Ok(match classification.state {
            TokenState::Valid => PublicValidation {
                valid: true,
                resource_preview: classification.preview,
                error: None,
            },
            _ => PublicValidation {
                valid: false,
                resource_preview: None,
                error: Some("invalid"),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::issuer::TokenIssuer;
    use nestlink_core::InviteDuration;
    use nestlink_db_memory::MemoryInviteStorage;

    struct Fixture {
        storage: Arc<MemoryInviteStorage>,
        directory: Arc<StaticDirectory>,
        validator: TokenValidator,
        issuer: TokenIssuer,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(MemoryInviteStorage::new());
        let directory = Arc::new(StaticDirectory::new());
        Fixture {
            validator: TokenValidator::new(storage.clone(), directory.clone()),
            issuer: TokenIssuer::new(storage.clone()),
            storage,
            directory,
        }
    }

    #[tokio::test]
    async fn test_valid_token_with_preview() {
        let f = fixture();
        let resource_id = Uuid::new_v4();
        f.directory.insert(resource_id, "Harbor View Flat").await;

        let token = f
            .issuer
            .issue(resource_id, Uuid::new_v4(), InviteDuration::OneWeek, 2)
            .await
            .unwrap();

        let classification = f.validator.classify(token.code.as_str()).await.unwrap();
        assert_eq!(classification.state, TokenState::Valid);
        assert_eq!(
            classification.preview.unwrap().display_name,
            "Harbor View Flat"
        );
        assert_eq!(classification.token_id, Some(token.id));
    }

    #[tokio::test]
    async fn test_valid_token_without_catalog_entry() {
        let f = fixture();
        let token = f
            .issuer
            .issue(Uuid::new_v4(), Uuid::new_v4(), InviteDuration::OneWeek, 1)
            .await
            .unwrap();

        let classification = f.validator.classify(token.code.as_str()).await.unwrap();
        assert_eq!(classification.state, TokenState::Valid);
        assert!(classification.preview.is_none());
    }

    #[tokio::test]
    async fn test_malformed_and_absent_classify_identically() {
        let f = fixture();

        let malformed = f.validator.classify("nope!").await.unwrap();
        let absent = f
            .validator
            .classify(InviteCode::generate().as_str())
            .await
            .unwrap();

        assert_eq!(malformed.state, TokenState::NotFound);
        assert_eq!(absent.state, TokenState::NotFound);
        assert!(malformed.token_id.is_none());
        assert!(absent.token_id.is_none());
    }

    #[tokio::test]
    async fn test_specific_states_for_authenticated_context() {
        let f = fixture();
        let now = OffsetDateTime::now_utc();

        // Revoked.
        let token = f
            .issuer
            .issue(Uuid::new_v4(), Uuid::new_v4(), InviteDuration::OneWeek, 1000)
            .await
            .unwrap();
        f.storage.revoke_token(token.id, now).await.unwrap();
        let c = f.validator.classify(token.code.as_str()).await.unwrap();
        assert_eq!(c.state, TokenState::Revoked);

        // Exhausted.
        let token = f
            .issuer
            .issue(Uuid::new_v4(), Uuid::new_v4(), InviteDuration::OneWeek, 1)
            .await
            .unwrap();
        f.storage.claim_use(token.id, now).await.unwrap();
        let c = f.validator.classify(token.code.as_str()).await.unwrap();
        assert_eq!(c.state, TokenState::Exhausted);
    }

    #[tokio::test]
    async fn test_public_projection_collapses_failures() {
        let f = fixture();
        let now = OffsetDateTime::now_utc();

        let revoked = f
            .issuer
            .issue(Uuid::new_v4(), Uuid::new_v4(), InviteDuration::OneWeek, 5)
            .await
            .unwrap();
        f.storage.revoke_token(revoked.id, now).await.unwrap();

        let exhausted = f
            .issuer
            .issue(Uuid::new_v4(), Uuid::new_v4(), InviteDuration::OneWeek, 1)
            .await
            .unwrap();
        f.storage.claim_use(exhausted.id, now).await.unwrap();

        let inputs = [
            "garbage?".to_string(),
            InviteCode::generate().as_str().to_string(),
            revoked.code.as_str().to_string(),
            exhausted.code.as_str().to_string(),
        ];

        for raw in &inputs {
            let v = f.validator.classify_public(raw).await.unwrap();
            assert!(!v.valid);
            assert_eq!(v.error, Some("invalid"));
            assert!(v.resource_preview.is_none());
            // Identical serialized shape across all causes.
            assert_eq!(
                serde_json::to_string(&v).unwrap(),
                "{\"valid\":false,\"error\":\"invalid\"}"
            );
        }
    }

    #[tokio::test]
    async fn test_public_projection_for_valid_token() {
        let f = fixture();
        let resource_id = Uuid::new_v4();
        f.directory.insert(resource_id, "Garden Studio").await;
        let token = f
            .issuer
            .issue(resource_id, Uuid::new_v4(), InviteDuration::OneDay, 1)
            .await
            .unwrap();

        let v = f.validator.classify_public(token.code.as_str()).await.unwrap();
        assert!(v.valid);
        assert!(v.error.is_none());
        assert_eq!(v.resource_preview.unwrap().resource_id, resource_id);
    }
}
