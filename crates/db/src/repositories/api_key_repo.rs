//! Repository for the `api_keys` table.

use imprint_core::types::DbId;
use sqlx::PgPool;

use crate::models::account::{ApiKey, ApiKeyPrincipal};

const COLUMNS: &str = "\
    id, account_id, name, key_hash, key_prefix, is_active, \
    last_used_at, revoked_at, created_at, updated_at";

/// Key issuance and hash lookups.
pub struct ApiKeyRepo;

impl ApiKeyRepo {
    /// Store a new key. Only the hash and display prefix are persisted.
    pub async fn create(
        pool: &PgPool,
        account_id: DbId,
        name: &str,
        key_hash: &str,
        key_prefix: &str,
    ) -> Result<ApiKey, sqlx::Error> {
        let query = format!(
            "INSERT INTO api_keys (account_id, name, key_hash, key_prefix) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ApiKey>(&query)
            .bind(account_id)
            .bind(name)
            .bind(key_hash)
            .bind(key_prefix)
            .fetch_one(pool)
            .await
    }

    /// Resolve an active, unrevoked key hash to its account and plan.
    pub async fn find_principal_by_hash(
        pool: &PgPool,
        key_hash: &str,
    ) -> Result<Option<ApiKeyPrincipal>, sqlx::Error> {
        sqlx::query_as::<_, ApiKeyPrincipal>(
            "SELECT k.id AS api_key_id, a.id AS account_id, a.plan_name \
             FROM api_keys k \
             JOIN accounts a ON a.id = k.account_id \
             WHERE k.key_hash = $1 AND k.is_active = true AND k.revoked_at IS NULL",
        )
        .bind(key_hash)
        .fetch_optional(pool)
        .await
    }

    /// Record that a key was just used.
    pub async fn touch_last_used(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Revoke a key. Returns `true` if an active key was revoked.
    pub async fn revoke(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE api_keys SET is_active = false, revoked_at = NOW() \
             WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
