//! Route definitions for the `/images` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::images;
use crate::state::AppState;

/// Routes mounted at `/images`.
///
/// ```text
/// POST   /                -> create_image
/// GET    /                -> list_images
/// GET    /{id}            -> get_image
/// DELETE /{id}            -> delete_image
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(images::list_images).post(images::create_image))
        .route("/{id}", get(images::get_image).delete(images::delete_image))
}
