//! Account, quota counter and API key models.

use imprint_core::quota::Usage;
use imprint_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `accounts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub id: DbId,
    pub email: String,
    pub plan_name: String,
    /// `None` means the plan is unlimited.
    pub monthly_limit: Option<i64>,
    pub api_calls_this_month: i64,
    /// Calls admitted but not yet committed (renders in flight).
    pub api_calls_reserved: i64,
    pub api_calls_reset_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Account {
    pub fn usage(&self) -> Usage {
        Usage::new(self.api_calls_this_month, self.monthly_limit)
    }
}

/// DTO for creating an account (seeding and tests; accounts are normally
/// provisioned by the account service).
#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub email: String,
    pub plan_name: String,
    pub monthly_limit: Option<i64>,
}

/// Quota counters returned by quota statements.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct UsageRow {
    pub api_calls_this_month: i64,
    pub api_calls_reserved: i64,
    pub monthly_limit: Option<i64>,
}

impl From<UsageRow> for Usage {
    fn from(row: UsageRow) -> Self {
        Usage::new(row.api_calls_this_month, row.monthly_limit)
    }
}

/// A row from the `api_keys` table.
///
/// **Note:** `key_hash` is never serialized to responses.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApiKey {
    pub id: DbId,
    pub account_id: DbId,
    pub name: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub key_prefix: String,
    pub is_active: bool,
    pub last_used_at: Option<Timestamp>,
    pub revoked_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The caller behind a valid API key, joined with its account's plan.
#[derive(Debug, Clone, FromRow)]
pub struct ApiKeyPrincipal {
    pub api_key_id: DbId,
    pub account_id: DbId,
    pub plan_name: String,
}
