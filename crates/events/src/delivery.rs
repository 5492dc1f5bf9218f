//! Signed webhook delivery with exponential-backoff retry.
//!
//! [`WebhookDelivery`] POSTs a JSON-encoded [`WebhookEvent`] to an endpoint.
//! The exact body bytes are signed with the registration's secret and the
//! signature is sent as `X-Imprint-Signature: sha256=<hex>`. Failed attempts
//! are retried after each delay in the schedule (1 s, 2 s, 4 s by default).

use std::time::Duration;

use imprint_core::api_keys::{signature_header_value, EVENT_HEADER, SIGNATURE_HEADER};

use crate::event::WebhookEvent;

/// Default backoff schedule between attempts.
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// HTTP timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// WebhookDelivery
// ---------------------------------------------------------------------------

/// Delivers events to external webhook endpoints.
pub struct WebhookDelivery {
    client: reqwest::Client,
    retry_delays: Vec<Duration>,
}

impl WebhookDelivery {
    /// Create a delivery service with the default retry schedule.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            retry_delays: RETRY_DELAYS.to_vec(),
        }
    }

    /// Replace the backoff schedule. One attempt is made up front and one
    /// more after each delay.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    /// Deliver `event` to `url`, signed with `secret`.
    ///
    /// Returns `Ok(())` on the first 2xx response, or the last error once
    /// the schedule is exhausted.
    pub async fn deliver(
        &self,
        url: &str,
        secret: &str,
        event: &WebhookEvent,
    ) -> Result<(), WebhookError> {
        let body = serde_json::to_string(event)?;
        let signature = signature_header_value(secret, &body);

        let mut result = self.try_send(url, &event.event, &signature, &body).await;
        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            let Err(e) = &result else {
                return Ok(());
            };
            tracing::warn!(
                attempt = attempt + 1,
                url,
                error = %e,
                "Webhook delivery attempt failed, retrying"
            );
            tokio::time::sleep(*delay).await;
            result = self.try_send(url, &event.event, &signature, &body).await;
        }

        if let Err(e) = &result {
            tracing::error!(url, event = %event.event, error = %e, "Webhook delivery failed after all retries");
        }
        result
    }

    /// Execute a single POST request and check the response status.
    async fn try_send(
        &self,
        url: &str,
        event_name: &str,
        signature: &str,
        body: &str,
    ) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(EVENT_HEADER, event_name)
            .header(SIGNATURE_HEADER, signature)
            .body(body.to_owned())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

impl Default for WebhookDelivery {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_error_display_http_status() {
        let err = WebhookError::HttpStatus(502);
        assert_eq!(err.to_string(), "Webhook returned HTTP 502");
    }

    #[test]
    fn webhook_error_display_request() {
        let req_err = reqwest::Client::new().get("://bad").build().unwrap_err();
        let err = WebhookError::Request(req_err);
        assert!(err.to_string().contains("HTTP request failed"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_after_schedule() {
        let delivery = WebhookDelivery::new().with_retry_delays(vec![Duration::ZERO]);
        let event = WebhookEvent::new("image.generated", serde_json::json!({}));
        let result = delivery.deliver("http://127.0.0.1:9/hook", "s", &event).await;
        assert!(matches!(result, Err(WebhookError::Request(_))));
    }
}
