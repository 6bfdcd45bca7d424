//! Redemption coordination.
//!
//! The concurrency-critical path. Many redeemers may present the same
//! multi-use token at once; the guarantee is that for `max_uses = N`
//! exactly N claims succeed and the counter never exceeds N. The
//! guarantee comes from the storage layer's atomic conditional update,
//! never from in-process locking — request handlers are stateless and
//! may run on different machines.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use nestlink_core::{InviteCode, NewRedemptionLink, RedemptionLink};
use nestlink_notifications::{RedemptionEvent, RedemptionNotifier};
use nestlink_storage::{ClaimOutcome, InviteStorage, LinkInsert};

use crate::error::{InviteError, InviteResult};

/// Outcome of a successful redemption call.
#[derive(Debug, Clone)]
pub enum Redemption {
    /// A usage slot was claimed and a new link created.
    Linked(RedemptionLink),
    /// This redeemer had already redeemed this token; the existing link
    /// is returned and no slot was consumed. A soft-success, not an
    /// error.
    AlreadyRedeemed(RedemptionLink),
}

impl Redemption {
    /// The link, whichever way it came about.
    #[must_use]
    pub fn link(&self) -> &RedemptionLink {
        match self {
            Self::Linked(link) | Self::AlreadyRedeemed(link) => link,
        }
    }

    /// Returns `true` for a repeat redemption.
    #[must_use]
    pub fn is_repeat(&self) -> bool {
        matches!(self, Self::AlreadyRedeemed(_))
    }
}

/// Coordinates atomic redemption of invite tokens.
pub struct RedemptionCoordinator {
    storage: Arc<dyn InviteStorage>,
    notifier: RedemptionNotifier,
}

impl RedemptionCoordinator {
    #[must_use]
    pub fn new(storage: Arc<dyn InviteStorage>, notifier: RedemptionNotifier) -> Self {
        Self { storage, notifier }
    }

    /// Redeem a token for an authenticated redeemer.
    ///
    /// Sequence:
    ///
    /// 1. lookup by code (the only read of the token row);
    /// 2. idempotency pre-check: an existing `(token, redeemer)` link
    ///    short-circuits to soft-success before any increment;
    /// 3. `claim_use` — quota, revocation and expiry decided in one
    ///    atomic storage operation;
    /// 4. link insert; a concurrent duplicate surfaces through the
    ///    uniqueness constraint, and the claimed slot is released.
    ///
    /// # Errors
    ///
    /// `NotFoundOrInvalid`, `Expired`, `Revoked`, `MaxUsesReached` per
    /// the claim outcome; `StoreUnavailable` on storage failure.
    pub async fn redeem(&self, raw: &str, redeemer_id: Uuid) -> InviteResult<Redemption> {
        if redeemer_id.is_nil() {
            return Err(InviteError::invalid_argument("redeemerId must not be nil"));
        }
        let Ok(code) = InviteCode::parse(raw) else {
            return Err(InviteError::NotFoundOrInvalid);
        };

        let Some(token) = self.storage.find_by_code(&code).await? else {
            return Err(InviteError::NotFoundOrInvalid);
        };

        // Repeat redemption must not burn a slot. The pre-check covers
        // the common case; the unique index remains the authority for
        // the racy one.
        if let Some(existing) = self.storage.find_link(token.id, redeemer_id).await? {
            return Ok(Redemption::AlreadyRedeemed(existing));
        }

        let now = OffsetDateTime::now_utc();
        let use_count = match self.storage.claim_use(token.id, now).await? {
            ClaimOutcome::Claimed { use_count } => use_count,
            ClaimOutcome::Exhausted => return Err(InviteError::MaxUsesReached),
            ClaimOutcome::Revoked => return Err(InviteError::Revoked),
            ClaimOutcome::Expired => return Err(InviteError::Expired),
            ClaimOutcome::NotFound => return Err(InviteError::NotFoundOrInvalid),
        };

        let new_link = NewRedemptionLink {
            token_id: token.id,
            redeemer_id,
            resource_id: token.resource_id,
        };

        let link = match self.storage.insert_link(&new_link).await {
            Ok(LinkInsert::Created(link)) => link,
            Ok(LinkInsert::AlreadyLinked(existing)) => {
                // Two requests from the same redeemer raced past the
                // pre-check; give the claimed slot back.
                self.storage.release_use(token.id).await?;
                return Ok(Redemption::AlreadyRedeemed(existing));
            }
            Err(e) => {
                // All-or-nothing from the caller's view: a failed link
                // insert must not leave the counter incremented.
                if let Err(release_err) = self.storage.release_use(token.id).await {
                    tracing::error!(
                        token_id = %token.id,
                        error = %release_err,
                        "Failed to release claimed slot after link insert failure"
                    );
                }
                return Err(e.into());
            }
        };

        tracing::info!(
            token_id = %token.id,
            resource_id = %token.resource_id,
            redeemer_id = %redeemer_id,
            use_count,
            "Invite redeemed"
        );

        self.notifier.notify(RedemptionEvent {
            token_id: token.id,
            resource_id: token.resource_id,
            issuer_id: token.issuer_id,
            redeemer_id,
            redeemed_at: link.redeemed_at,
            use_count,
        });

        Ok(Redemption::Linked(link))
    }
}
