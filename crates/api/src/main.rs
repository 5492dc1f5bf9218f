use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use imprint_api::app::build_app;
use imprint_api::config::ServerConfig;
use imprint_api::jobs::{recover_interrupted_jobs, JobQueue};
use imprint_api::state::AppState;
use imprint_api::storage::{AssetStore, DataUriStore, S3AssetStore};
use imprint_db::PgStore;
use imprint_events::{WebhookDelivery, WebhookDispatcher};
use imprint_render::{RenderContext, Renderer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env();

    // --- Tracing ---
    let json_logs = config.log_json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "imprint_api=debug,imprint_render=info,imprint_events=info,tower_http=debug".into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = imprint_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    imprint_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    imprint_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let store = Arc::new(PgStore::new(pool.clone()));

    // --- Job recovery (before accepting requests) ---
    recover_interrupted_jobs(store.as_ref())
        .await
        .expect("Failed to recover interrupted render jobs");

    // --- Render engine ---
    let render_ctx =
        RenderContext::new(config.render.settings()).expect("Failed to build render context");
    tracing::info!(
        fonts = render_ctx.font_count(),
        render_timeout_secs = config.render.render_timeout_secs,
        "Render context ready"
    );
    let renderer = Arc::new(Renderer::new(render_ctx));

    // --- Asset storage ---
    let assets: Arc<dyn AssetStore> = match &config.storage.s3_bucket {
        Some(bucket) => {
            tracing::info!(%bucket, prefix = %config.storage.s3_prefix, "Storing assets in S3");
            Arc::new(S3AssetStore::from_env(bucket, &config.storage).await)
        }
        None => {
            tracing::warn!("S3_BUCKET not set, returning images as data URIs");
            Arc::new(DataUriStore)
        }
    };

    // --- Webhooks ---
    let webhooks = WebhookDispatcher::new(store.clone(), Arc::new(WebhookDelivery::new()));

    // --- App state ---
    let jobs = JobQueue::new();
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let state = AppState {
        store,
        renderer,
        assets,
        webhooks,
        jobs: jobs.clone(),
        config: Arc::new(config.clone()),
        pool: Some(pool),
    };

    let app = build_app(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!(
        in_flight = jobs.in_flight(),
        "Server stopped accepting connections, draining render jobs"
    );
    if jobs.shutdown(shutdown_timeout).await {
        tracing::info!("Graceful shutdown complete");
    } else {
        tracing::warn!("Shutdown deadline reached, remaining jobs will be failed on next start");
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
