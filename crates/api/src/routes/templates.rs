use axum::routing::get;
use axum::Router;

use crate::handlers::templates;
use crate::state::AppState;

/// Routes mounted at `/templates`.
///
/// ```text
/// GET    /{id}/variables  -> get_template_variables
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/variables", get(templates::get_template_variables))
}
