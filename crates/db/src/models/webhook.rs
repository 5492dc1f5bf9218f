//! Webhook registrations. Managed by the account service; read here to
//! dispatch notifications.

use imprint_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `webhooks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Webhook {
    pub id: DbId,
    pub account_id: DbId,
    pub url: String,
    #[serde(skip_serializing)]
    pub secret: String,
    /// JSON array of subscribed event names.
    pub event_types: serde_json::Value,
    pub is_enabled: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Webhook {
    /// Whether this registration wants `event`. An empty list means all events.
    pub fn subscribes_to(&self, event: &str) -> bool {
        match self.event_types.as_array() {
            Some(events) if !events.is_empty() => {
                events.iter().any(|e| e.as_str() == Some(event))
            }
            _ => true,
        }
    }
}

/// DTO for registering a webhook (seeding and tests).
#[derive(Debug, Clone)]
pub struct CreateWebhook {
    pub account_id: DbId,
    pub url: String,
    pub secret: String,
    pub event_types: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webhook(events: serde_json::Value) -> Webhook {
        Webhook {
            id: 1,
            account_id: 1,
            url: "https://hooks.test/x".into(),
            secret: "s".into(),
            event_types: events,
            is_enabled: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn empty_event_list_subscribes_to_everything() {
        assert!(webhook(serde_json::json!([])).subscribes_to("image.generated"));
    }

    #[test]
    fn explicit_event_list_filters() {
        let hook = webhook(serde_json::json!(["image.generated"]));
        assert!(hook.subscribes_to("image.generated"));
        assert!(!hook.subscribes_to("job.failed"));
    }
}
