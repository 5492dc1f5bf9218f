//! Webhook event envelope and payloads.

use chrono::{DateTime, Utc};
use imprint_core::types::DbId;
use serde::{Deserialize, Serialize};

/// Event name sent when a render finishes successfully.
pub const IMAGE_GENERATED: &str = "image.generated";

/// The JSON body POSTed to webhook endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Dot-separated event name, e.g. `"image.generated"`.
    pub event: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl WebhookEvent {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Payload of [`IMAGE_GENERATED`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerated {
    pub image_id: DbId,
    pub template_id: DbId,
    pub image_url: String,
    pub format: String,
    /// Set when the render ran as an async job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<DbId>,
}

impl From<ImageGenerated> for WebhookEvent {
    fn from(data: ImageGenerated) -> Self {
        Self::new(
            IMAGE_GENERATED,
            serde_json::to_value(data).unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_generated_envelope_shape() {
        let event: WebhookEvent = ImageGenerated {
            image_id: 7,
            template_id: 3,
            image_url: "https://cdn.test/a.png".into(),
            format: "png".into(),
            job_id: None,
        }
        .into();

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "image.generated");
        assert_eq!(json["data"]["image_id"], 7);
        assert_eq!(json["data"]["image_url"], "https://cdn.test/a.png");
        assert!(json["data"].get("job_id").is_none());
        assert!(json["timestamp"].is_string());
    }
}
