#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use imprint_api::app::build_app;
use imprint_api::config::{RenderConfig, ServerConfig, StorageConfig};
use imprint_api::jobs::JobQueue;
use imprint_api::state::AppState;
use imprint_api::storage::DataUriStore;
use imprint_core::output::RenderOptions;
use imprint_core::scene::{Layer, LayerKind, SceneDocument, TextLayer};
use imprint_core::types::DbId;
use imprint_db::models::account::{Account, CreateAccount};
use imprint_db::models::template::CreateTemplate;
use imprint_db::MemoryStore;
use imprint_events::{WebhookDelivery, WebhookDispatcher};
use imprint_render::{RenderEngine, RenderError, RenderOutput};
use serde_json::Value;
use tokio::sync::Semaphore;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        render: RenderConfig::default(),
        storage: StorageConfig::default(),
        log_json: false,
    }
}

/// A router wired to an in-memory store, inline asset storage and the
/// given render engine.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub jobs: JobQueue,
}

pub fn build_test_app(engine: Arc<dyn RenderEngine>) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let delivery = WebhookDelivery::new().with_retry_delays(Vec::new());
    let webhooks = WebhookDispatcher::new(store.clone(), Arc::new(delivery));
    let jobs = JobQueue::new();

    let state = AppState {
        store: store.clone(),
        renderer: engine,
        assets: Arc::new(DataUriStore),
        webhooks,
        jobs: jobs.clone(),
        config: Arc::new(test_config()),
        pool: None,
    };

    TestApp {
        router: build_app(state),
        store,
        jobs,
    }
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// An account and a plaintext key for it.
pub struct Tenant {
    pub account_id: DbId,
    pub api_key: String,
}

pub async fn seed_tenant(store: &MemoryStore, monthly_limit: Option<i64>) -> Tenant {
    let account = store
        .create_account(CreateAccount {
            email: format!("tenant-{}@example.com", next_suffix()),
            plan_name: (if monthly_limit.is_some() { "starter" } else { "enterprise" }).into(),
            monthly_limit,
        })
        .await;
    let api_key = store.issue_api_key(account.id).await;
    Tenant {
        account_id: account.id,
        api_key,
    }
}

fn next_suffix() -> usize {
    static NEXT: AtomicUsize = AtomicUsize::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

pub async fn seed_template(store: &MemoryStore, account_id: DbId, scene: SceneDocument) -> DbId {
    store
        .create_template(CreateTemplate {
            account_id,
            name: "social card".into(),
            scene,
        })
        .await
        .id
}

/// 1200x630 card with a single `Hello {{name}}` text layer.
pub fn hello_scene() -> SceneDocument {
    text_scene("Hello {{name}}")
}

pub fn text_scene(content: &str) -> SceneDocument {
    SceneDocument::new(1200, 630)
        .with_background("#ffffff")
        .with_layer(Layer::new(LayerKind::Text(TextLayer::new(content))).at(100.0, 280.0))
}

pub async fn account(store: &MemoryStore, account_id: DbId) -> Account {
    store.account(account_id).await.expect("account exists")
}

// ---------------------------------------------------------------------------
// Render engines
// ---------------------------------------------------------------------------

/// Records every scene it is asked to render and returns fixed bytes.
///
/// With a gate, each render waits for one permit before returning.
#[derive(Default)]
pub struct StubEngine {
    pub calls: AtomicUsize,
    pub scenes: Mutex<Vec<SceneDocument>>,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
}

impl StubEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    /// An engine blocked until permits are added to the returned semaphore.
    pub fn gated() -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let engine = Arc::new(Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        });
        (engine, gate)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Content of the first text layer of the most recent render.
    pub fn last_text(&self) -> Option<String> {
        let scenes = self.scenes.lock().unwrap();
        scenes.last()?.layers.iter().find_map(|layer| match &layer.kind {
            LayerKind::Text(text) => Some(text.content.clone()),
            _ => None,
        })
    }
}

#[async_trait]
impl RenderEngine for StubEngine {
    async fn render(
        &self,
        scene: &SceneDocument,
        options: &RenderOptions,
    ) -> Result<RenderOutput, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.scenes.lock().unwrap().push(scene.clone());
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate open").forget();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(RenderOutput {
            bytes: b"stub-image".to_vec(),
            format: options.format,
            width: scene.canvas_width,
            height: scene.canvas_height,
        })
    }
}

/// Always reports a render timeout.
pub struct FailingEngine;

#[async_trait]
impl RenderEngine for FailingEngine {
    async fn render(
        &self,
        _scene: &SceneDocument,
        _options: &RenderOptions,
    ) -> Result<RenderOutput, RenderError> {
        Err(RenderError::Timeout(Duration::from_secs(10)))
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub fn post_json(uri: &str, api_key: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("authorization", format!("Bearer {key}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, api_key: Option<&str>) -> Request<Body> {
    request("GET", uri, api_key)
}

pub fn delete(uri: &str, api_key: Option<&str>) -> Request<Body> {
    request("DELETE", uri, api_key)
}

fn request(method: &str, uri: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("authorization", format!("Bearer {key}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Send a request and parse the JSON body (`Value::Null` when empty).
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Poll a job until it reaches `done` or `failed`.
pub async fn wait_for_terminal(router: &Router, job_id: i64, api_key: &str) -> Value {
    for _ in 0..200 {
        let uri = format!("/api/v1/jobs/{job_id}");
        let (status, body) = send(router, get(&uri, Some(api_key))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        if body["status"] == "done" || body["status"] == "failed" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not finish");
}
