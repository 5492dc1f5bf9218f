use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// `ok`, `unreachable`, or `none` when running without PostgreSQL.
    pub database: &'static str,
    /// Async render jobs currently running.
    pub jobs_in_flight: usize,
}

/// GET /health -- returns service and database health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match &state.pool {
        Some(pool) => match imprint_db::health_check(pool).await {
            Ok(()) => "ok",
            Err(e) => {
                tracing::warn!(error = %e, "Database health check failed");
                "unreachable"
            }
        },
        None => "none",
    };

    let status = if database == "unreachable" {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        database,
        jobs_in_flight: state.jobs.in_flight(),
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
