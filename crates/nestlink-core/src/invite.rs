//! Invite token and redemption link domain types.
//!
//! An [`InviteToken`] grants a bounded, revocable right to link a redeemer
//! to a resource. A [`RedemptionLink`] records one successful redemption.
//!
//! Lifecycle rules:
//!
//! - Tokens are created only by the issuer service and mutated only by the
//!   redemption coordinator (`use_count`) and the revocation manager
//!   (`revoked_at`).
//! - `use_count <= max_uses` holds at all times, including under
//!   concurrent redemption; the storage layer enforces it with an atomic
//!   conditional update.
//! - Links are immutable once created, one per `(token, redeemer)` pair.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::CoreError;
use crate::token::InviteCode;

// =============================================================================
// Duration allow-list
// =============================================================================

/// Supported invite lifetimes.
///
/// Expiry is always computed server-side from one of these spans; a
/// client-supplied timestamp is never trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum InviteDuration {
    OneDay,
    OneWeek,
    TwoWeeks,
    OneMonth,
}

impl InviteDuration {
    /// Map a day count onto the allow-list.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::UnsupportedDuration` for any span outside
    /// {1, 7, 14, 30}.
    pub fn from_days(days: i64) -> Result<Self, CoreError> {
        match days {
            1 => Ok(Self::OneDay),
            7 => Ok(Self::OneWeek),
            14 => Ok(Self::TwoWeeks),
            30 => Ok(Self::OneMonth),
            other => Err(CoreError::UnsupportedDuration(other)),
        }
    }

    /// The span in whole days.
    #[must_use]
    pub fn days(self) -> i64 {
        match self {
            Self::OneDay => 1,
            Self::OneWeek => 7,
            Self::TwoWeeks => 14,
            Self::OneMonth => 30,
        }
    }

    /// Absolute expiry for a token issued at `issued_at`.
    #[must_use]
    pub fn expires_at(self, issued_at: OffsetDateTime) -> OffsetDateTime {
        issued_at + Duration::days(self.days())
    }
}

impl TryFrom<i64> for InviteDuration {
    type Error = CoreError;

    fn try_from(days: i64) -> Result<Self, Self::Error> {
        Self::from_days(days)
    }
}

impl From<InviteDuration> for i64 {
    fn from(duration: InviteDuration) -> Self {
        duration.days()
    }
}

// =============================================================================
// Invite token
// =============================================================================

/// Invite token record as persisted.
///
/// The full record, including `use_count` and `max_uses`, is shown only to
/// the issuer. Redeemers see a reduced projection (resource preview plus
/// validity).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteToken {
    /// Internal identifier, never exposed to unauthenticated callers.
    pub id: Uuid,

    /// The bearer secret.
    pub code: InviteCode,

    /// Resource this token grants access to.
    pub resource_id: Uuid,

    /// Principal who created the token.
    pub issuer_id: Uuid,

    /// When this token was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Absolute expiry, computed server-side at issuance.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Usage quota.
    pub max_uses: u32,

    /// Successful redemptions so far. Invariant: `use_count <= max_uses`.
    pub use_count: u32,

    /// When this token was revoked (None = not revoked). Once set the
    /// token is permanently unusable regardless of quota or expiry.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub revoked_at: Option<OffsetDateTime>,

    /// Soft-delete marker for the out-of-band retention sweep.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub deleted_at: Option<OffsetDateTime>,
}

impl InviteToken {
    /// Returns `true` if this token has expired as of `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }

    /// Returns `true` if this token has been revoked.
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Returns `true` if the usage quota is spent.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.use_count >= self.max_uses
    }

    /// Classify this token as of `now`.
    ///
    /// Revocation takes precedence over expiry, and both take precedence
    /// over quota exhaustion.
    #[must_use]
    pub fn state_at(&self, now: OffsetDateTime) -> TokenState {
        if self.is_revoked() {
            TokenState::Revoked
        } else if self.is_expired_at(now) {
            TokenState::Expired
        } else if self.is_exhausted() {
            TokenState::Exhausted
        } else {
            TokenState::Valid
        }
    }

    /// Returns `true` if this token is redeemable as of `now`.
    #[must_use]
    pub fn is_redeemable_at(&self, now: OffsetDateTime) -> bool {
        self.state_at(now) == TokenState::Valid
    }
}

/// Parameters for persisting a new invite token.
#[derive(Debug, Clone)]
pub struct NewInviteToken {
    pub code: InviteCode,
    pub resource_id: Uuid,
    pub issuer_id: Uuid,
    pub expires_at: OffsetDateTime,
    pub max_uses: u32,
}

/// Definite classification of a presented token.
///
/// Only authenticated redemption contexts may see which specific state
/// applies; unauthenticated callers get a collapsed generic answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Valid,
    Expired,
    Revoked,
    Exhausted,
    NotFound,
}

// =============================================================================
// Redemption link
// =============================================================================

/// One successful redemption of a token by a redeemer.
///
/// Immutable once created; the store enforces uniqueness per
/// `(token_id, redeemer_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionLink {
    pub id: Uuid,
    pub token_id: Uuid,
    pub redeemer_id: Uuid,
    pub resource_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub redeemed_at: OffsetDateTime,
}

/// Parameters for persisting a new redemption link.
#[derive(Debug, Clone)]
pub struct NewRedemptionLink {
    pub token_id: Uuid,
    pub redeemer_id: Uuid,
    pub resource_id: Uuid,
}

// =============================================================================
// Resource preview
// =============================================================================

/// Reduced projection of a resource shown to a redeemer previewing a
/// valid invite. Carries no issuer metadata and no usage counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePreview {
    pub resource_id: Uuid,
    pub display_name: String,
}

// =============================================================================
// Tests
// =============================================================================
