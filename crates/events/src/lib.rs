//! Outbound notifications for the Imprint render service.
//!
//! - [`WebhookEvent`] -- the `{event, data, timestamp}` envelope.
//! - [`WebhookDelivery`] -- signed HTTP POST with exponential-backoff retry.
//! - [`WebhookDispatcher`] -- fire-and-forget fan-out to an account's
//!   registered endpoints.

pub mod delivery;
pub mod dispatcher;
pub mod event;

pub use delivery::{WebhookDelivery, WebhookError};
pub use dispatcher::WebhookDispatcher;
pub use event::{ImageGenerated, WebhookEvent, IMAGE_GENERATED};
