//! Invite revocation.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use nestlink_storage::{InviteStorage, StorageError};

use crate::error::{InviteError, InviteResult};

/// Marks tokens unusable immediately, independent of expiry.
///
/// Revocation is an unconditional flag set; any in-flight redemption
/// that has not yet committed its atomic increment will observe it,
/// because the claim folds the revocation check into the same storage
/// operation as the increment.
pub struct RevocationManager {
    storage: Arc<dyn InviteStorage>,
}

impl RevocationManager {
    #[must_use]
    pub fn new(storage: Arc<dyn InviteStorage>) -> Self {
        Self { storage }
    }

    /// Revoke a token.
    ///
    /// The caller must be the token's issuer or hold the administrative
    /// capability. Idempotent: revoking an already-revoked token is a
    /// no-op success.
    ///
    /// # Errors
    ///
    /// - `NotFoundOrInvalid` if no live token has this id.
    /// - `Forbidden` if the caller is neither issuer nor admin.
    pub async fn revoke(
        &self,
        token_id: Uuid,
        caller_id: Uuid,
        is_admin: bool,
    ) -> InviteResult<()> {
        let Some(token) = self.storage.find_by_id(token_id).await? else {
            return Err(InviteError::NotFoundOrInvalid);
        };

        if token.issuer_id != caller_id && !is_admin {
            tracing::warn!(
                token_id = %token_id,
                caller_id = %caller_id,
                "Revocation denied: caller is not the issuer"
            );
            return Err(InviteError::Forbidden);
        }

        let now = OffsetDateTime::now_utc();
        match self.storage.revoke_token(token_id, now).await {
            Ok(revoked_now) => {
                if revoked_now {
                    tracing::info!(token_id = %token_id, caller_id = %caller_id, "Invite revoked");
                }
                Ok(())
            }
            // Deleted between the read and the write; same answer as an
            // unknown token.
            Err(StorageError::NotFound(_)) => Err(InviteError::NotFoundOrInvalid),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuer::TokenIssuer;
    use nestlink_core::InviteDuration;
    use nestlink_db_memory::MemoryInviteStorage;

    struct Fixture {
        storage: Arc<MemoryInviteStorage>,
        issuer: TokenIssuer,
        revocation: RevocationManager,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(MemoryInviteStorage::new());
        Fixture {
            issuer: TokenIssuer::new(storage.clone()),
            revocation: RevocationManager::new(storage.clone()),
            storage,
        }
    }

    #[tokio::test]
    async fn test_issuer_can_revoke() {
        let f = fixture();
        let issuer_id = Uuid::new_v4();
        let token = f
            .issuer
            .issue(Uuid::new_v4(), issuer_id, InviteDuration::OneWeek, 1000)
            .await
            .unwrap();

        f.revocation.revoke(token.id, issuer_id, false).await.unwrap();

        let stored = f.storage.find_by_id(token.id).await.unwrap().unwrap();
        assert!(stored.is_revoked());
        // Quota was untouched; revocation alone killed the token.
        assert_eq!(stored.use_count, 0);
    }

    #[tokio::test]
    async fn test_non_issuer_is_forbidden() {
        let f = fixture();
        let token = f
            .issuer
            .issue(Uuid::new_v4(), Uuid::new_v4(), InviteDuration::OneWeek, 1)
            .await
            .unwrap();

        let err = f
            .revocation
            .revoke(token.id, Uuid::new_v4(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, InviteError::Forbidden));

        let stored = f.storage.find_by_id(token.id).await.unwrap().unwrap();
        assert!(!stored.is_revoked());
    }

    #[tokio::test]
    async fn test_admin_can_revoke_any_token() {
        let f = fixture();
        let token = f
            .issuer
            .issue(Uuid::new_v4(), Uuid::new_v4(), InviteDuration::OneWeek, 1)
            .await
            .unwrap();

        f.revocation
            .revoke(token.id, Uuid::new_v4(), true)
            .await
            .unwrap();
        let stored = f.storage.find_by_id(token.id).await.unwrap().unwrap();
        assert!(stored.is_revoked());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let f = fixture();
        let issuer_id = Uuid::new_v4();
        let token = f
            .issuer
            .issue(Uuid::new_v4(), issuer_id, InviteDuration::OneWeek, 1)
            .await
            .unwrap();

        f.revocation.revoke(token.id, issuer_id, false).await.unwrap();
        f.revocation.revoke(token.id, issuer_id, false).await.unwrap();
    }

    #[tokio::test]
    async fn test_revoke_unknown_token() {
        let f = fixture();
        let err = f
            .revocation
            .revoke(Uuid::new_v4(), Uuid::new_v4(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, InviteError::NotFoundOrInvalid));
    }
}
