use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use nestlink_core::{InviteCode, InviteToken, NewInviteToken, NewRedemptionLink, RedemptionLink};
use nestlink_storage::{ClaimOutcome, InviteStorage, LinkInsert, StorageError, StorageResult};

/// Mutable backend state. Guarded by one mutex so every operation sees a
/// consistent snapshot and mutates atomically.
#[derive(Debug, Default)]
struct State {
    tokens: HashMap<Uuid, InviteToken>,
    /// Code string -> token id. Stands in for the unique index on `code`.
    by_code: HashMap<String, Uuid>,
    /// `(token_id, redeemer_id)` -> link. Stands in for the composite
    /// unique index on the link table.
    links: HashMap<(Uuid, Uuid), RedemptionLink>,
}

/// In-memory invite storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryInviteStorage {
    state: Arc<Mutex<State>>,
}

impl MemoryInviteStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-deleted) tokens. Test helper.
    pub async fn token_count(&self) -> usize {
        let state = self.state.lock().await;
        state
            .tokens
            .values()
            .filter(|t| t.deleted_at.is_none())
            .count()
    }

    /// Number of redemption links. Test helper.
    pub async fn link_count(&self) -> usize {
        self.state.lock().await.links.len()
    }
}

#[async_trait]
impl InviteStorage for MemoryInviteStorage {
    async fn insert_token(&self, new: &NewInviteToken) -> StorageResult<InviteToken> {
        let mut state = self.state.lock().await;
        if state.by_code.contains_key(new.code.as_str()) {
            return Err(StorageError::conflict(format!(
                "invite code '{}' already exists",
                new.code
            )));
        }

        let token = InviteToken {
            id: Uuid::new_v4(),
            code: new.code.clone(),
            resource_id: new.resource_id,
            issuer_id: new.issuer_id,
            created_at: OffsetDateTime::now_utc(),
            expires_at: new.expires_at,
            max_uses: new.max_uses,
            use_count: 0,
            revoked_at: None,
            deleted_at: None,
        };

        state.by_code.insert(token.code.as_str().to_string(), token.id);
        state.tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn find_by_code(&self, code: &InviteCode) -> StorageResult<Option<InviteToken>> {
        let state = self.state.lock().await;
        let token = state
            .by_code
            .get(code.as_str())
            .and_then(|id| state.tokens.get(id))
            .filter(|t| t.deleted_at.is_none())
            .cloned();
        Ok(token)
    }

    async fn find_by_id(&self, token_id: Uuid) -> StorageResult<Option<InviteToken>> {
        let state = self.state.lock().await;
        Ok(state
            .tokens
            .get(&token_id)
            .filter(|t| t.deleted_at.is_none())
            .cloned())
    }

    async fn list_by_issuer(&self, issuer_id: Uuid) -> StorageResult<Vec<InviteToken>> {
        let state = self.state.lock().await;
        let mut tokens: Vec<InviteToken> = state
            .tokens
            .values()
            .filter(|t| t.issuer_id == issuer_id && t.deleted_at.is_none())
            .cloned()
            .collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tokens)
    }

    async fn claim_use(&self, token_id: Uuid, now: OffsetDateTime) -> StorageResult<ClaimOutcome> {
        let mut state = self.state.lock().await;
        let Some(token) = state
            .tokens
            .get_mut(&token_id)
            .filter(|t| t.deleted_at.is_none())
        else {
            return Ok(ClaimOutcome::NotFound);
        };

        // Same gate order as the conditional UPDATE in the Postgres
        // backend: revocation, then expiry, then quota.
        if token.revoked_at.is_some() {
            return Ok(ClaimOutcome::Revoked);
        }
        if now > token.expires_at {
            return Ok(ClaimOutcome::Expired);
        }
        if token.use_count >= token.max_uses {
            return Ok(ClaimOutcome::Exhausted);
        }

        token.use_count += 1;
        Ok(ClaimOutcome::Claimed {
            use_count: token.use_count,
        })
    }

    async fn release_use(&self, token_id: Uuid) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        if let Some(token) = state.tokens.get_mut(&token_id) {
            token.use_count = token.use_count.saturating_sub(1);
        }
        Ok(())
    }

    async fn revoke_token(&self, token_id: Uuid, now: OffsetDateTime) -> StorageResult<bool> {
        let mut state = self.state.lock().await;
        let Some(token) = state
            .tokens
            .get_mut(&token_id)
            .filter(|t| t.deleted_at.is_none())
        else {
            return Err(StorageError::not_found(format!("InviteToken {token_id}")));
        };

        if token.revoked_at.is_some() {
            return Ok(false);
        }
        token.revoked_at = Some(now);
        Ok(true)
    }

    async fn insert_link(&self, new: &NewRedemptionLink) -> StorageResult<LinkInsert> {
        let mut state = self.state.lock().await;
        let key = (new.token_id, new.redeemer_id);
        if let Some(existing) = state.links.get(&key) {
            return Ok(LinkInsert::AlreadyLinked(existing.clone()));
        }

        let link = RedemptionLink {
            id: Uuid::new_v4(),
            token_id: new.token_id,
            redeemer_id: new.redeemer_id,
            resource_id: new.resource_id,
            redeemed_at: OffsetDateTime::now_utc(),
        };
        state.links.insert(key, link.clone());
        Ok(LinkInsert::Created(link))
    }

    async fn find_link(
        &self,
        token_id: Uuid,
        redeemer_id: Uuid,
    ) -> StorageResult<Option<RedemptionLink>> {
        let state = self.state.lock().await;
        Ok(state.links.get(&(token_id, redeemer_id)).cloned())
    }

    async fn mark_deleted(&self, token_id: Uuid, now: OffsetDateTime) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        let Some(token) = state.tokens.get_mut(&token_id) else {
            return Err(StorageError::not_found(format!("InviteToken {token_id}")));
        };
        token.deleted_at.get_or_insert(now);
        Ok(())
    }

    async fn purge_deleted(&self, before: OffsetDateTime) -> StorageResult<u64> {
        let mut state = self.state.lock().await;
        let doomed: Vec<Uuid> = state
            .tokens
            .values()
            .filter(|t| t.deleted_at.is_some_and(|at| at < before))
            .map(|t| t.id)
            .collect();

        for id in &doomed {
            if let Some(token) = state.tokens.remove(id) {
                state.by_code.remove(token.code.as_str());
            }
            state.links.retain(|(token_id, _), _| token_id != id);
        }
        Ok(doomed.len() as u64)
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestlink_core::InviteDuration;
    use time::Duration;

    fn new_token(max_uses: u32) -> NewInviteToken {
        let now = OffsetDateTime::now_utc();
        NewInviteToken {
            code: InviteCode::generate(),
            resource_id: Uuid::new_v4(),
            issuer_id: Uuid::new_v4(),
            expires_at: InviteDuration::OneWeek.expires_at(now),
            max_uses,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_by_code() {
        let storage = MemoryInviteStorage::new();
        let new = new_token(3);
        let token = storage.insert_token(&new).await.unwrap();

        assert_eq!(token.use_count, 0);
        assert_eq!(token.max_uses, 3);

        let found = storage.find_by_code(&new.code).await.unwrap().unwrap();
        assert_eq!(found.id, token.id);

        let absent = storage
            .find_by_code(&InviteCode::generate())
            .await
            .unwrap();
        assert!(absent.is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_code_conflicts() {
        let storage = MemoryInviteStorage::new();
        let new = new_token(1);
        storage.insert_token(&new).await.unwrap();

        let err = storage.insert_token(&new).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_claim_decrements_quota_in_order() {
        let storage = MemoryInviteStorage::new();
        let token = storage.insert_token(&new_token(2)).await.unwrap();
        let now = OffsetDateTime::now_utc();

        assert_eq!(
            storage.claim_use(token.id, now).await.unwrap(),
            ClaimOutcome::Claimed { use_count: 1 }
        );
        assert_eq!(
            storage.claim_use(token.id, now).await.unwrap(),
            ClaimOutcome::Claimed { use_count: 2 }
        );
        assert_eq!(
            storage.claim_use(token.id, now).await.unwrap(),
            ClaimOutcome::Exhausted
        );
    }

    #[tokio::test]
    async fn test_claim_respects_revocation_and_expiry() {
        let storage = MemoryInviteStorage::new();
        let now = OffsetDateTime::now_utc();

        let token = storage.insert_token(&new_token(1000)).await.unwrap();
        storage.revoke_token(token.id, now).await.unwrap();
        assert_eq!(
            storage.claim_use(token.id, now).await.unwrap(),
            ClaimOutcome::Revoked
        );

        let token = storage.insert_token(&new_token(5)).await.unwrap();
        let future = now + Duration::days(365);
        assert_eq!(
            storage.claim_use(token.id, future).await.unwrap(),
            ClaimOutcome::Expired
        );

        assert_eq!(
            storage.claim_use(Uuid::new_v4(), now).await.unwrap(),
            ClaimOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_concurrent_claims_never_exceed_quota() {
        let storage = MemoryInviteStorage::new();
        let max_uses = 5u32;
        let token = storage.insert_token(&new_token(max_uses)).await.unwrap();
        let now = OffsetDateTime::now_utc();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let storage = storage.clone();
            let token_id = token.id;
            handles.push(tokio::spawn(async move {
                storage.claim_use(token_id, now).await.unwrap()
            }));
        }

        let mut claimed = 0;
        let mut exhausted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                ClaimOutcome::Claimed { use_count } => {
                    assert!(use_count <= max_uses);
                    claimed += 1;
                }
                ClaimOutcome::Exhausted => exhausted += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }

        assert_eq!(claimed, max_uses);
        assert_eq!(exhausted, 50 - max_uses);

        let stored = storage.find_by_id(token.id).await.unwrap().unwrap();
        assert_eq!(stored.use_count, max_uses);
    }

    #[tokio::test]
    async fn test_release_use_compensates() {
        let storage = MemoryInviteStorage::new();
        let token = storage.insert_token(&new_token(1)).await.unwrap();
        let now = OffsetDateTime::now_utc();

        storage.claim_use(token.id, now).await.unwrap();
        storage.release_use(token.id).await.unwrap();

        let stored = storage.find_by_id(token.id).await.unwrap().unwrap();
        assert_eq!(stored.use_count, 0);

        // Never goes below zero.
        storage.release_use(token.id).await.unwrap();
        let stored = storage.find_by_id(token.id).await.unwrap().unwrap();
        assert_eq!(stored.use_count, 0);
    }

    #[tokio::test]
    async fn test_link_uniqueness_per_pair() {
        let storage = MemoryInviteStorage::new();
        let token = storage.insert_token(&new_token(5)).await.unwrap();
        let redeemer = Uuid::new_v4();

        let new_link = NewRedemptionLink {
            token_id: token.id,
            redeemer_id: redeemer,
            resource_id: token.resource_id,
        };

        let first = storage.insert_link(&new_link).await.unwrap();
        let LinkInsert::Created(link) = first else {
            panic!("expected Created");
        };

        let second = storage.insert_link(&new_link).await.unwrap();
        let LinkInsert::AlreadyLinked(existing) = second else {
            panic!("expected AlreadyLinked");
        };
        assert_eq!(existing.id, link.id);
        assert_eq!(storage.link_count().await, 1);

        // Different redeemer, same token: a distinct link.
        let other = NewRedemptionLink {
            redeemer_id: Uuid::new_v4(),
            ..new_link
        };
        assert!(matches!(
            storage.insert_link(&other).await.unwrap(),
            LinkInsert::Created(_)
        ));
        assert_eq!(storage.link_count().await, 2);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let storage = MemoryInviteStorage::new();
        let token = storage.insert_token(&new_token(1)).await.unwrap();
        let now = OffsetDateTime::now_utc();

        assert!(storage.revoke_token(token.id, now).await.unwrap());
        assert!(!storage.revoke_token(token.id, now).await.unwrap());

        let err = storage.revoke_token(Uuid::new_v4(), now).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_token() {
        let storage = MemoryInviteStorage::new();
        let new = new_token(1);
        let token = storage.insert_token(&new).await.unwrap();
        let now = OffsetDateTime::now_utc();

        storage.mark_deleted(token.id, now).await.unwrap();

        assert!(storage.find_by_code(&new.code).await.unwrap().is_none());
        assert!(storage.find_by_id(token.id).await.unwrap().is_none());
        assert_eq!(
            storage.claim_use(token.id, now).await.unwrap(),
            ClaimOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_purge_removes_old_deleted_rows() {
        let storage = MemoryInviteStorage::new();
        let now = OffsetDateTime::now_utc();

        let old = storage.insert_token(&new_token(1)).await.unwrap();
        storage
            .mark_deleted(old.id, now - Duration::days(90))
            .await
            .unwrap();

        let recent = storage.insert_token(&new_token(1)).await.unwrap();
        storage.mark_deleted(recent.id, now).await.unwrap();

        let live = storage.insert_token(&new_token(1)).await.unwrap();

        let purged = storage
            .purge_deleted(now - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(purged, 1);

        // The live token and the recently deleted one survive the sweep.
        assert!(storage.find_by_id(live.id).await.unwrap().is_some());
        assert!(storage.find_by_id(recent.id).await.unwrap().is_none());
        assert_eq!(storage.token_count().await, 1);
    }

    #[tokio::test]
    async fn test_list_by_issuer_newest_first() {
        let storage = MemoryInviteStorage::new();
        let issuer = Uuid::new_v4();

        for _ in 0..3 {
            let mut new = new_token(1);
            new.issuer_id = issuer;
            storage.insert_token(&new).await.unwrap();
        }
        storage.insert_token(&new_token(1)).await.unwrap();

        let listed = storage.list_by_issuer(issuer).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }
}
