//! PostgreSQL storage backend for nestlink.
//!
//! One `invite_token` table and one `redemption_link` table. The
//! concurrency guarantees of the redemption path are anchored here:
//!
//! - the usage claim is a single conditional `UPDATE ... RETURNING` that
//!   folds quota, revocation and expiry into one statement;
//! - link idempotency rides the composite unique index on
//!   `redemption_link (token_id, redeemer_id)`, surfaced as
//!   [`LinkInsert::AlreadyLinked`] instead of an error.
//!
//! # Example
//!
//! ```ignore
//! use nestlink_db_postgres::PostgresInviteStorage;
//!
//! let storage = PostgresInviteStorage::connect("postgres://localhost/nestlink").await?;
//! storage.migrate().await?;
//! ```

mod storage;

use std::sync::Arc;

use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

use nestlink_storage::{StorageError, StorageResult};

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use storage::PostgresInviteStorage;

/// Map a driver error onto the storage taxonomy.
///
/// Connection-level failures become `Unavailable` (retryable); everything
/// else is a plain `Database` error. Unique violations are handled at the
/// call sites that expect them.
pub(crate) fn map_sqlx_error(err: sqlx_core::Error) -> StorageError {
    match err {
        sqlx_core::Error::PoolTimedOut
        | sqlx_core::Error::PoolClosed
        | sqlx_core::Error::Io(_) => StorageError::unavailable(err.to_string()),
        other => StorageError::database(other.to_string()),
    }
}

/// Returns `true` if the error is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx_core::Error) -> bool {
    matches!(err, sqlx_core::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Apply the invite schema.
///
/// Idempotent `CREATE TABLE IF NOT EXISTS` statements; safe to run at
/// every boot.
pub async fn migrate(pool: &PgPool) -> StorageResult<()> {
    use sqlx_core::executor::Executor;

    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS invite_token (
            id          UUID PRIMARY KEY,
            code        TEXT NOT NULL,
            resource_id UUID NOT NULL,
            issuer_id   UUID NOT NULL,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            expires_at  TIMESTAMPTZ NOT NULL,
            max_uses    INTEGER NOT NULL CHECK (max_uses >= 1),
            use_count   INTEGER NOT NULL DEFAULT 0 CHECK (use_count >= 0 AND use_count <= max_uses),
            revoked_at  TIMESTAMPTZ,
            deleted_at  TIMESTAMPTZ,
            CONSTRAINT invite_token_code_unique UNIQUE (code)
        )
        "#,
    )
    .await
    .map_err(map_sqlx_error)?;

    pool.execute(
        r#"
        CREATE INDEX IF NOT EXISTS invite_token_issuer_idx
            ON invite_token (issuer_id, created_at DESC)
        "#,
    )
    .await
    .map_err(map_sqlx_error)?;

    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS redemption_link (
            id          UUID PRIMARY KEY,
            token_id    UUID NOT NULL REFERENCES invite_token (id),
            redeemer_id UUID NOT NULL,
            resource_id UUID NOT NULL,
            redeemed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT redemption_link_pair_unique UNIQUE (token_id, redeemer_id)
        )
        "#,
    )
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

/// Connect and wrap a pool.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect(database_url: &str) -> Result<Arc<PgPool>, StorageError> {
    use sqlx_core::pool::PoolOptions;
    let pool = PoolOptions::<Postgres>::new()
        .connect(database_url)
        .await
        .map_err(map_sqlx_error)?;
    Ok(Arc::new(pool))
}
