//! Invite storage over PostgreSQL.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use nestlink_core::{InviteCode, InviteToken, NewInviteToken, NewRedemptionLink, RedemptionLink};
use nestlink_storage::{ClaimOutcome, InviteStorage, LinkInsert, StorageError, StorageResult};

use crate::{PgPool, is_unique_violation, map_sqlx_error};

/// Database row shape for `invite_token`.
type TokenRow = (
    Uuid,                  // id
    String,                // code
    Uuid,                  // resource_id
    Uuid,                  // issuer_id
    OffsetDateTime,        // created_at
    OffsetDateTime,        // expires_at
    i32,                   // max_uses
    i32,                   // use_count
    Option<OffsetDateTime>, // revoked_at
    Option<OffsetDateTime>, // deleted_at
);

/// Database row shape for `redemption_link`.
type LinkRow = (Uuid, Uuid, Uuid, Uuid, OffsetDateTime);

const TOKEN_COLUMNS: &str =
    "id, code, resource_id, issuer_id, created_at, expires_at, max_uses, use_count, revoked_at, deleted_at";

fn token_from_row(row: TokenRow) -> StorageResult<InviteToken> {
    let code = InviteCode::parse(&row.1)
        .map_err(|_| StorageError::invalid_input("stored invite code is malformed"))?;
    Ok(InviteToken {
        id: row.0,
        code,
        resource_id: row.2,
        issuer_id: row.3,
        created_at: row.4,
        expires_at: row.5,
        max_uses: u32::try_from(row.6)
            .map_err(|_| StorageError::invalid_input("stored max_uses out of range"))?,
        use_count: u32::try_from(row.7)
            .map_err(|_| StorageError::invalid_input("stored use_count out of range"))?,
        revoked_at: row.8,
        deleted_at: row.9,
    })
}

fn link_from_row(row: LinkRow) -> RedemptionLink {
    RedemptionLink {
        id: row.0,
        token_id: row.1,
        redeemer_id: row.2,
        resource_id: row.3,
        redeemed_at: row.4,
    }
}

/// PostgreSQL-backed invite storage.
#[derive(Debug, Clone)]
pub struct PostgresInviteStorage {
    pool: Arc<PgPool>,
}

impl PostgresInviteStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Apply the invite schema. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if a schema statement fails.
    pub async fn migrate(&self) -> StorageResult<()> {
        crate::migrate(&self.pool).await
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl InviteStorage for PostgresInviteStorage {
    async fn insert_token(&self, new: &NewInviteToken) -> StorageResult<InviteToken> {
        let id = Uuid::new_v4();
        let max_uses = i32::try_from(new.max_uses)
            .map_err(|_| StorageError::invalid_input("max_uses out of range"))?;

        let row: TokenRow = query_as(&format!(
            r#"
            INSERT INTO invite_token (id, code, resource_id, issuer_id, expires_at, max_uses)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(new.code.as_str())
        .bind(new.resource_id)
        .bind(new.issuer_id)
        .bind(new.expires_at)
        .bind(max_uses)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return StorageError::conflict(format!(
                    "invite code '{}' already exists",
                    new.code
                ));
            }
            map_sqlx_error(e)
        })?;

        token_from_row(row)
    }

    async fn find_by_code(&self, code: &InviteCode) -> StorageResult<Option<InviteToken>> {
        let row: Option<TokenRow> = query_as(&format!(
            r#"
            SELECT {TOKEN_COLUMNS}
            FROM invite_token
            WHERE code = $1
              AND deleted_at IS NULL
            "#
        ))
        .bind(code.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(token_from_row).transpose()
    }

    async fn find_by_id(&self, token_id: Uuid) -> StorageResult<Option<InviteToken>> {
        let row: Option<TokenRow> = query_as(&format!(
            r#"
            SELECT {TOKEN_COLUMNS}
            FROM invite_token
            WHERE id = $1
              AND deleted_at IS NULL
            "#
        ))
        .bind(token_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(token_from_row).transpose()
    }

    async fn list_by_issuer(&self, issuer_id: Uuid) -> StorageResult<Vec<InviteToken>> {
        let rows: Vec<TokenRow> = query_as(&format!(
            r#"
            SELECT {TOKEN_COLUMNS}
            FROM invite_token
            WHERE issuer_id = $1
              AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#
        ))
        .bind(issuer_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(token_from_row).collect()
    }

    async fn claim_use(&self, token_id: Uuid, now: OffsetDateTime) -> StorageResult<ClaimOutcome> {
        // The one mutation in the redemption hot path: quota, revocation
        // and expiry are all conditions of the same UPDATE, so no
        // interleaving of concurrent redeemers can push use_count past
        // max_uses or slip through a revocation.
        let claimed: Option<(i32,)> = query_as(
            r#"
            UPDATE invite_token
            SET use_count = use_count + 1
            WHERE id = $1
              AND deleted_at IS NULL
              AND revoked_at IS NULL
              AND expires_at > $2
              AND use_count < max_uses
            RETURNING use_count
            "#,
        )
        .bind(token_id)
        .bind(now)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if let Some((use_count,)) = claimed {
            let use_count = u32::try_from(use_count)
                .map_err(|_| StorageError::invalid_input("stored use_count out of range"))?;
            return Ok(ClaimOutcome::Claimed { use_count });
        }

        // The UPDATE matched nothing. Re-read to name the closed gate;
        // this read is diagnostic only, no mutation depends on it.
        let row: Option<(Option<OffsetDateTime>, OffsetDateTime, i32, i32)> = query_as(
            r#"
            SELECT revoked_at, expires_at, use_count, max_uses
            FROM invite_token
            WHERE id = $1
              AND deleted_at IS NULL
            "#,
        )
        .bind(token_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some((revoked_at, expires_at, _use_count, _max_uses)) = row else {
            return Ok(ClaimOutcome::NotFound);
        };

        if revoked_at.is_some() {
            Ok(ClaimOutcome::Revoked)
        } else if now > expires_at {
            Ok(ClaimOutcome::Expired)
        } else {
            // A slot released between the two statements still reads as
            // exhausted here, which was accurate when the UPDATE ran.
            Ok(ClaimOutcome::Exhausted)
        }
    }

    async fn release_use(&self, token_id: Uuid) -> StorageResult<()> {
        query(
            r#"
            UPDATE invite_token
            SET use_count = GREATEST(use_count - 1, 0)
            WHERE id = $1
            "#,
        )
        .bind(token_id)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn revoke_token(&self, token_id: Uuid, now: OffsetDateTime) -> StorageResult<bool> {
        let updated: Option<(Uuid,)> = query_as(
            r#"
            UPDATE invite_token
            SET revoked_at = $2
            WHERE id = $1
              AND deleted_at IS NULL
              AND revoked_at IS NULL
            RETURNING id
            "#,
        )
        .bind(token_id)
        .bind(now)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if updated.is_some() {
            return Ok(true);
        }

        // Distinguish "already revoked" from "no such token".
        let exists: Option<(Uuid,)> = query_as(
            r#"
            SELECT id FROM invite_token
            WHERE id = $1
              AND deleted_at IS NULL
            "#,
        )
        .bind(token_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match exists {
            Some(_) => Ok(false),
            None => Err(StorageError::not_found(format!("InviteToken {token_id}"))),
        }
    }

    async fn insert_link(&self, new: &NewRedemptionLink) -> StorageResult<LinkInsert> {
        let id = Uuid::new_v4();
        let inserted: Result<LinkRow, sqlx_core::Error> = query_as(
            r#"
            INSERT INTO redemption_link (id, token_id, redeemer_id, resource_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, token_id, redeemer_id, resource_id, redeemed_at
            "#,
        )
        .bind(id)
        .bind(new.token_id)
        .bind(new.redeemer_id)
        .bind(new.resource_id)
        .fetch_one(&*self.pool)
        .await;

        match inserted {
            Ok(row) => Ok(LinkInsert::Created(link_from_row(row))),
            Err(e) if is_unique_violation(&e) => {
                // A concurrent redemption by the same redeemer won the
                // insert; surface its row as the idempotent result.
                let existing = self
                    .find_link(new.token_id, new.redeemer_id)
                    .await?
                    .ok_or_else(|| {
                        StorageError::conflict("redemption link vanished after unique violation")
                    })?;
                Ok(LinkInsert::AlreadyLinked(existing))
            }
            Err(e) => Err(map_sqlx_error(e)),
        }
    }

    async fn find_link(
        &self,
        token_id: Uuid,
        redeemer_id: Uuid,
    ) -> StorageResult<Option<RedemptionLink>> {
        let row: Option<LinkRow> = query_as(
            r#"
            SELECT id, token_id, redeemer_id, resource_id, redeemed_at
            FROM redemption_link
            WHERE token_id = $1
              AND redeemer_id = $2
            "#,
        )
        .bind(token_id)
        .bind(redeemer_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(link_from_row))
    }

    async fn mark_deleted(&self, token_id: Uuid, now: OffsetDateTime) -> StorageResult<()> {
        let updated: Option<(Uuid,)> = query_as(
            r#"
            UPDATE invite_token
            SET deleted_at = COALESCE(deleted_at, $2)
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(token_id)
        .bind(now)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match updated {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found(format!("InviteToken {token_id}"))),
        }
    }

    async fn purge_deleted(&self, before: OffsetDateTime) -> StorageResult<u64> {
        // Links first to satisfy the foreign key.
        query(
            r#"
            DELETE FROM redemption_link
            WHERE token_id IN (
                SELECT id FROM invite_token WHERE deleted_at < $1
            )
            "#,
        )
        .bind(before)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let result = query(
            r#"
            DELETE FROM invite_token
            WHERE deleted_at < $1
            "#,
        )
        .bind(before)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> StorageResult<()> {
        query("SELECT 1")
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
