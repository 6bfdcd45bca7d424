//! The invite storage trait.
//!
//! All coordination between concurrent redeemers happens through this
//! trait: [`InviteStorage::claim_use`] is the single atomic gate for
//! quota, revocation and expiry, and [`InviteStorage::insert_link`]
//! enforces one link per `(token, redeemer)` through a uniqueness
//! constraint rather than a prior read.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use nestlink_core::{InviteCode, InviteToken, NewInviteToken, NewRedemptionLink, RedemptionLink};

use crate::error::StorageResult;

/// Outcome of an atomic usage claim.
///
/// `claim_use` evaluates quota, revocation and expiry in one storage
/// operation. On failure the variant names the gate that closed; the
/// counter is untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The slot was claimed; carries the post-increment use count.
    Claimed { use_count: u32 },
    /// `use_count` had already reached `max_uses`.
    Exhausted,
    /// `revoked_at` was set.
    Revoked,
    /// `expires_at` was in the past.
    Expired,
    /// No live token with this id.
    NotFound,
}

/// Outcome of a redemption link insert.
#[derive(Debug, Clone)]
pub enum LinkInsert {
    /// A new link row was created.
    Created(RedemptionLink),
    /// A link for this `(token, redeemer)` pair already existed; carries
    /// the existing row. Reported from the uniqueness constraint, never
    /// from a prior read.
    AlreadyLinked(RedemptionLink),
}

/// Storage contract for invite tokens and redemption links.
///
/// Implementations must be thread-safe (`Send + Sync`). Request handlers
/// share no in-process mutable state; every cross-request guarantee in
/// the redemption path is provided by this trait's atomicity contracts.
#[async_trait]
pub trait InviteStorage: Send + Sync {
    // ==================== Tokens ====================

    /// Persist a new invite token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the code collides with an
    /// existing token (the issuer retries generation on this).
    async fn insert_token(&self, new: &NewInviteToken) -> StorageResult<InviteToken>;

    /// Look up a token by its bearer code.
    ///
    /// Always a single indexed read; soft-deleted rows are excluded.
    /// Returns `Ok(None)` for absent codes — absence is not an error.
    async fn find_by_code(&self, code: &InviteCode) -> StorageResult<Option<InviteToken>>;

    /// Look up a token by its internal id. Soft-deleted rows are excluded.
    async fn find_by_id(&self, token_id: Uuid) -> StorageResult<Option<InviteToken>>;

    /// List all tokens created by an issuer, newest first.
    async fn list_by_issuer(&self, issuer_id: Uuid) -> StorageResult<Vec<InviteToken>>;

    // ==================== Atomic usage claim ====================

    /// Atomically claim one usage slot.
    ///
    /// Equivalent to
    /// `UPDATE ... SET use_count = use_count + 1
    ///  WHERE id = $1 AND use_count < max_uses
    ///    AND revoked_at IS NULL AND expires_at > $now
    ///  RETURNING use_count`
    /// as a single operation. Never read-then-write: a token revoked or
    /// exhausted by a concurrent request is reflected in the outcome.
    async fn claim_use(&self, token_id: Uuid, now: OffsetDateTime) -> StorageResult<ClaimOutcome>;

    /// Release a previously claimed slot.
    ///
    /// Compensation for the rare race where the claim succeeds but the
    /// link insert hits the uniqueness constraint. Decrements
    /// `use_count`, never below zero.
    async fn release_use(&self, token_id: Uuid) -> StorageResult<()>;

    // ==================== Revocation ====================

    /// Set `revoked_at` unconditionally.
    ///
    /// Returns `false` if the token was already revoked (idempotent
    /// no-op), `true` if this call revoked it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no live token has this id.
    async fn revoke_token(&self, token_id: Uuid, now: OffsetDateTime) -> StorageResult<bool>;

    // ==================== Redemption links ====================

    /// Insert a redemption link, mapping a `(token_id, redeemer_id)`
    /// uniqueness violation to [`LinkInsert::AlreadyLinked`].
    async fn insert_link(&self, new: &NewRedemptionLink) -> StorageResult<LinkInsert>;

    /// Look up an existing link for a `(token, redeemer)` pair.
    async fn find_link(
        &self,
        token_id: Uuid,
        redeemer_id: Uuid,
    ) -> StorageResult<Option<RedemptionLink>>;

    // ==================== Retention ====================

    /// Soft-delete a token. Soft-deleted tokens vanish from every
    /// validity path; rows remain for the retention sweep.
    async fn mark_deleted(&self, token_id: Uuid, now: OffsetDateTime) -> StorageResult<()>;

    /// Hard-delete soft-deleted tokens older than `before`, returning the
    /// number removed. Run by the out-of-band retention job only.
    async fn purge_deleted(&self, before: OffsetDateTime) -> StorageResult<u64>;

    // ==================== Metadata ====================

    /// Whether the backend is reachable. Used by the health endpoint.
    async fn ping(&self) -> StorageResult<()>;

    /// Backend name for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
