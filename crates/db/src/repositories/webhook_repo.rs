//! Repository for the `webhooks` table.

use imprint_core::types::DbId;
use sqlx::PgPool;

use crate::models::webhook::{CreateWebhook, Webhook};

const COLUMNS: &str = "\
    id, account_id, url, secret, event_types, is_enabled, created_at, updated_at";

/// Webhook registrations.
pub struct WebhookRepo;

impl WebhookRepo {
    pub async fn create(pool: &PgPool, input: &CreateWebhook) -> Result<Webhook, sqlx::Error> {
        let query = format!(
            "INSERT INTO webhooks (account_id, url, secret, event_types) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Webhook>(&query)
            .bind(input.account_id)
            .bind(&input.url)
            .bind(&input.secret)
            .bind(serde_json::json!(input.event_types))
            .fetch_one(pool)
            .await
    }

    /// Enabled webhooks of an account subscribed to `event`.
    ///
    /// An empty `event_types` array subscribes to every event.
    pub async fn list_enabled_for_event(
        pool: &PgPool,
        account_id: DbId,
        event: &str,
    ) -> Result<Vec<Webhook>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM webhooks \
             WHERE account_id = $1 AND is_enabled = true \
               AND (jsonb_array_length(event_types) = 0 OR event_types ? $2) \
             ORDER BY id"
        );
        sqlx::query_as::<_, Webhook>(&query)
            .bind(account_id)
            .bind(event)
            .fetch_all(pool)
            .await
    }
}
