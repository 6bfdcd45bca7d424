//! Invite issuance.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use nestlink_core::{InviteCode, InviteDuration, InviteToken, NewInviteToken};
use nestlink_storage::InviteStorage;

use crate::error::{InviteError, InviteResult};

/// Attempts at generating a non-colliding code before giving up.
const GENERATION_ATTEMPTS: u32 = 3;

/// Default ceiling on `max_uses` per token.
pub const DEFAULT_MAX_USES_CEILING: u32 = 1000;

/// Creates invite tokens.
///
/// Authorization (does the issuer control this resource?) is enforced by
/// the access-control collaborator before this service is called; the
/// issuer still rejects malformed ids and out-of-range quotas.
pub struct TokenIssuer {
    storage: Arc<dyn InviteStorage>,
    max_uses_ceiling: u32,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(storage: Arc<dyn InviteStorage>) -> Self {
        Self {
            storage,
            max_uses_ceiling: DEFAULT_MAX_USES_CEILING,
        }
    }

    /// Override the quota ceiling (from configuration).
    #[must_use]
    pub fn with_max_uses_ceiling(mut self, ceiling: u32) -> Self {
        self.max_uses_ceiling = ceiling;
        self
    }

    /// Issue a new invite token.
    ///
    /// Expiry is computed server-side from the duration allow-list. The
    /// returned record is the full view, for the issuer's eyes only.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for nil ids or a quota outside `1..=ceiling`.
    /// - `GenerationExhausted` if three generated codes all collided; an
    ///   operational alarm, not a user mistake.
    /// - `StoreUnavailable` on storage failure.
    pub async fn issue(
        &self,
        resource_id: Uuid,
        issuer_id: Uuid,
        duration: InviteDuration,
        max_uses: u32,
    ) -> InviteResult<InviteToken> {
        if resource_id.is_nil() {
            return Err(InviteError::invalid_argument("resourceId must not be nil"));
        }
        if issuer_id.is_nil() {
            return Err(InviteError::invalid_argument("issuerId must not be nil"));
        }
        if max_uses == 0 {
            return Err(InviteError::invalid_argument("maxUses must be at least 1"));
        }
        if max_uses > self.max_uses_ceiling {
            return Err(InviteError::invalid_argument(format!(
                "maxUses must not exceed {}",
                self.max_uses_ceiling
            )));
        }

        let now = OffsetDateTime::now_utc();
        let expires_at = duration.expires_at(now);

        for attempt in 1..=GENERATION_ATTEMPTS {
            let new = NewInviteToken {
                code: InviteCode::generate(),
                resource_id,
                issuer_id,
                expires_at,
                max_uses,
            };

            match self.storage.insert_token(&new).await {
                Ok(token) => {
                    tracing::info!(
                        token_id = %token.id,
                        resource_id = %resource_id,
                        issuer_id = %issuer_id,
                        max_uses,
                        duration_days = duration.days(),
                        "Invite issued"
                    );
                    return Ok(token);
                }
                Err(e) if e.is_conflict() => {
                    tracing::warn!(attempt, "Invite code collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!(
            attempts = GENERATION_ATTEMPTS,
            "Invite code generation exhausted; investigate issuance volume or RNG health"
        );
        Err(InviteError::GenerationExhausted {
            attempts: GENERATION_ATTEMPTS,
        })
    }
}
