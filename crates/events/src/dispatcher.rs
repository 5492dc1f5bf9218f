//! Fan-out of events to an account's registered webhooks.

use std::sync::Arc;

use futures::future::join_all;
use imprint_core::types::DbId;
use imprint_db::store::WebhookStore;
use tokio::task::JoinHandle;

use crate::delivery::WebhookDelivery;
use crate::event::WebhookEvent;

/// Looks up subscribed endpoints and delivers to each of them in a
/// detached task. Callers never wait on delivery.
#[derive(Clone)]
pub struct WebhookDispatcher {
    store: Arc<dyn WebhookStore>,
    delivery: Arc<WebhookDelivery>,
}

impl WebhookDispatcher {
    pub fn new(store: Arc<dyn WebhookStore>, delivery: Arc<WebhookDelivery>) -> Self {
        Self { store, delivery }
    }

    /// Spawn delivery of `event` to every enabled webhook of `account_id`
    /// subscribed to it. Failures are logged, never propagated.
    ///
    /// The handle is only useful to tests; production callers drop it.
    pub fn dispatch(&self, account_id: DbId, event: WebhookEvent) -> JoinHandle<usize> {
        let store = Arc::clone(&self.store);
        let delivery = Arc::clone(&self.delivery);
        tokio::spawn(async move {
            let hooks = match store.webhooks_for_event(account_id, &event.event).await {
                Ok(hooks) => hooks,
                Err(e) => {
                    tracing::error!(account_id, error = %e, "Failed to load webhooks");
                    return 0;
                }
            };

            let results = join_all(hooks.iter().map(|hook| {
                let event = &event;
                let delivery = &delivery;
                async move {
                    let outcome = delivery.deliver(&hook.url, &hook.secret, event).await;
                    (hook.id, outcome)
                }
            }))
            .await;

            let mut delivered = 0;
            for (webhook_id, outcome) in results {
                match outcome {
                    Ok(()) => {
                        delivered += 1;
                        tracing::debug!(account_id, webhook_id, event = %event.event, "Webhook delivered");
                    }
                    Err(e) => {
                        tracing::warn!(account_id, webhook_id, error = %e, "Webhook delivery abandoned");
                    }
                }
            }
            delivered
        })
    }
}
