//! Template introspection.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use imprint_core::error::CoreError;
use imprint_core::substitution::extract_variable_names;
use imprint_core::types::DbId;
use imprint_db::store::TemplateStore;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::ApiKeyAuth;
use crate::middleware::extract::ApiPath;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TemplateVariables {
    pub template_id: DbId,
    pub name: String,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Distinct `{{name}}` tokens in text layers, sorted.
    pub variables: Vec<String>,
}

/// GET /api/v1/templates/{id}/variables
///
/// The names a render request can fill via `modifications`.
pub async fn get_template_variables(
    caller: ApiKeyAuth,
    State(state): State<AppState>,
    ApiPath(template_id): ApiPath<DbId>,
) -> AppResult<impl IntoResponse> {
    let template = state
        .store
        .find_template(template_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Template",
            id: template_id,
        })?;

    if !template.is_owned_by(caller.account_id) {
        return Err(CoreError::Forbidden("Template belongs to another account".into()).into());
    }

    let scene = template.scene_document()?;
    Ok(Json(TemplateVariables {
        template_id: template.id,
        name: template.name,
        canvas_width: scene.canvas_width,
        canvas_height: scene.canvas_height,
        variables: extract_variable_names(&scene).into_iter().collect(),
    }))
}
