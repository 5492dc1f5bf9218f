//! Repository for the `accounts` table and its quota counters.
//!
//! Every quota statement is a single conditional `UPDATE`, so concurrent
//! requests for one account serialize on the row lock and re-check the
//! limit after the previous writer commits.

use imprint_core::types::DbId;
use sqlx::PgPool;

use crate::models::account::{Account, CreateAccount, UsageRow};

/// Column list for `accounts` queries.
const COLUMNS: &str = "\
    id, email, plan_name, monthly_limit, api_calls_this_month, \
    api_calls_reserved, api_calls_reset_at, created_at, updated_at";

/// Columns returned by quota statements.
const USAGE_COLUMNS: &str = "api_calls_this_month, api_calls_reserved, monthly_limit";

/// Account lookups and quota counter updates.
pub struct AccountRepo;

impl AccountRepo {
    /// Insert a new account with zeroed counters.
    pub async fn create(pool: &PgPool, input: &CreateAccount) -> Result<Account, sqlx::Error> {
        let query = format!(
            "INSERT INTO accounts (email, plan_name, monthly_limit) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Account>(&query)
            .bind(&input.email)
            .bind(&input.plan_name)
            .bind(input.monthly_limit)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Account>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Current committed usage for an account.
    pub async fn usage(pool: &PgPool, id: DbId) -> Result<Option<UsageRow>, sqlx::Error> {
        let query = format!("SELECT {USAGE_COLUMNS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, UsageRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Reserve one call if `used + reserved < limit` (or the plan is unlimited).
    ///
    /// Returns `false` when the account is at its limit or does not exist.
    pub async fn reserve_call(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts \
             SET api_calls_reserved = api_calls_reserved + 1 \
             WHERE id = $1 \
               AND (monthly_limit IS NULL \
                    OR api_calls_this_month + api_calls_reserved < monthly_limit)",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Convert one reservation into a committed call.
    pub async fn commit_call(pool: &PgPool, id: DbId) -> Result<Option<UsageRow>, sqlx::Error> {
        let query = format!(
            "UPDATE accounts \
             SET api_calls_this_month = api_calls_this_month + 1, \
                 api_calls_reserved = GREATEST(api_calls_reserved - 1, 0) \
             WHERE id = $1 \
             RETURNING {USAGE_COLUMNS}"
        );
        sqlx::query_as::<_, UsageRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Drop one reservation without counting it.
    pub async fn release_call(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE accounts \
             SET api_calls_reserved = GREATEST(api_calls_reserved - 1, 0) \
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Start a new billing cycle. Returns `true` if the account exists.
    pub async fn reset_cycle(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts \
             SET api_calls_this_month = 0, api_calls_reset_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Zero every outstanding reservation.
    ///
    /// Only safe at startup, before any request is admitted: reservations
    /// left by a crashed process would otherwise hold capacity forever.
    pub async fn clear_reservations(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts SET api_calls_reserved = 0 WHERE api_calls_reserved > 0",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
