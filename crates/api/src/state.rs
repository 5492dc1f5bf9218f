use std::sync::Arc;

use imprint_db::{DbPool, Store};
use imprint_events::WebhookDispatcher;
use imprint_render::RenderEngine;

use crate::config::ServerConfig;
use crate::jobs::JobQueue;
use crate::storage::AssetStore;

/// Shared application state available to all handlers via Axum's `State` extractor.
///
/// Every collaborator sits behind a trait object so the router can be
/// driven in tests with an in-memory store and stand-in render engines.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub renderer: Arc<dyn RenderEngine>,
    pub assets: Arc<dyn AssetStore>,
    pub webhooks: WebhookDispatcher,
    pub jobs: JobQueue,
    /// Server configuration (CORS, timeouts, render limits).
    pub config: Arc<ServerConfig>,
    /// Present when running against PostgreSQL; used by the health check.
    pub pool: Option<DbPool>,
}
