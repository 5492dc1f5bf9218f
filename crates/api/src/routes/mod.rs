pub mod health;
pub mod images;
pub mod jobs;
pub mod templates;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Every route requires an `Authorization: Bearer <api key>` header.
///
/// ```text
/// /images                         render (POST, ?async=true), list (GET)
/// /images/{id}                    get, delete
///
/// /jobs/{id}                      poll an async render
///
/// /templates/{id}/variables       variable names used by a template
///
/// /usage                          API calls used this cycle
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/images", images::router())
        .nest("/jobs", jobs::router())
        .nest("/templates", templates::router())
        .route("/usage", get(handlers::usage::get_usage))
}
