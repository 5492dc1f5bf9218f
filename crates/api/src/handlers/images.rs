//! Handlers for the `/images` resource.
//!
//! `POST /images` renders a template. Everything else reads or deletes the
//! caller's own generated-image records.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use imprint_core::error::CoreError;
use imprint_core::output::{OutputFormat, RenderOptions};
use imprint_core::quota::Usage;
use imprint_core::substitution::VariableMap;
use imprint_core::types::{DbId, Timestamp};
use imprint_db::models::status::JobStatus;
use imprint_db::store::ImageStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppResult;
use crate::middleware::auth::ApiKeyAuth;
use crate::middleware::extract::{ApiJson, ApiPath, ApiQuery};
use crate::orchestrator::{self, RenderRequest};
use crate::query::{PaginationParams, RenderModeParams};
use crate::response::{DataResponse, PageResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /api/v1/images`.
#[derive(Debug, Deserialize)]
pub struct CreateImageBody {
    /// A number or a string of digits.
    pub template_id: Value,
    #[serde(default)]
    pub modifications: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub quality: Option<i64>,
}

impl TryFrom<CreateImageBody> for RenderRequest {
    type Error = CoreError;

    fn try_from(body: CreateImageBody) -> Result<Self, Self::Error> {
        let template_id = parse_id(&body.template_id)?;
        let variables = body
            .modifications
            .map(parse_modifications)
            .transpose()?
            .unwrap_or_default();

        let format = match body.format.as_deref() {
            Some(name) => name.parse()?,
            None => OutputFormat::default(),
        };
        let quality = body
            .quality
            .map(|q| {
                u8::try_from(q).map_err(|_| {
                    CoreError::Validation("quality must be between 1 and 100".into())
                })
            })
            .transpose()?;
        let options = RenderOptions::new(format, quality).validated()?;

        Ok(RenderRequest {
            template_id,
            variables,
            options,
        })
    }
}

fn parse_id(value: &Value) -> Result<DbId, CoreError> {
    let id = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.filter(|id| *id > 0)
        .ok_or_else(|| CoreError::Validation("template_id must be a positive integer id".into()))
}

/// Stringify scalar modification values.
///
/// Numbers and booleans use their JSON text, `null` becomes the empty
/// string, and nested arrays or objects are rejected.
pub fn parse_modifications(
    raw: serde_json::Map<String, Value>,
) -> Result<VariableMap, CoreError> {
    raw.into_iter()
        .map(|(name, value)| {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(CoreError::Validation(format!(
                        "modifications.{name} must be a string, number, boolean or null"
                    )));
                }
            };
            Ok((name, text))
        })
        .collect()
}

/// Successful synchronous render.
#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub success: bool,
    pub image_id: DbId,
    pub image_url: String,
    pub template_id: DbId,
    pub format: String,
    pub generated_at: Timestamp,
    pub usage: Usage,
}

/// Async render accepted.
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: DbId,
    pub status: JobStatus,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/images
///
/// Render a template. With `?async=true` the render is queued and the
/// response is `202` with the job id to poll.
pub async fn create_image(
    caller: ApiKeyAuth,
    State(state): State<AppState>,
    ApiQuery(mode): ApiQuery<RenderModeParams>,
    ApiJson(body): ApiJson<CreateImageBody>,
) -> AppResult<Response> {
    let request = RenderRequest::try_from(body)?;

    if mode.run_async {
        let job = orchestrator::submit_job(&state, caller.account_id, request).await?;
        let accepted = JobAccepted {
            job_id: job.id,
            status: job.status(),
        };
        return Ok((StatusCode::ACCEPTED, Json(accepted)).into_response());
    }

    let outcome = orchestrator::render_now(&state, caller.account_id, request).await?;
    let image = outcome.image;
    Ok(Json(RenderResponse {
        success: true,
        image_id: image.id,
        image_url: image.image_url,
        template_id: image.template_id,
        format: image.format,
        generated_at: image.created_at,
        usage: outcome.usage,
    })
    .into_response())
}

/// GET /api/v1/images
///
/// The caller's generated images, newest first.
pub async fn list_images(
    caller: ApiKeyAuth,
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let (limit, offset) = (params.limit(), params.offset());
    let (images, total) = state
        .store
        .list_images(caller.account_id, limit, offset)
        .await?;
    Ok(Json(PageResponse {
        data: images,
        total,
        limit,
        offset,
    }))
}

/// GET /api/v1/images/{id}
pub async fn get_image(
    caller: ApiKeyAuth,
    State(state): State<AppState>,
    ApiPath(image_id): ApiPath<DbId>,
) -> AppResult<impl IntoResponse> {
    let image = state
        .store
        .find_image(image_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Image",
            id: image_id,
        })?;
    if image.account_id != caller.account_id {
        return Err(CoreError::Forbidden("Image belongs to another account".into()).into());
    }
    Ok(Json(DataResponse { data: image }))
}

/// DELETE /api/v1/images/{id}
///
/// Removes the record only; stored assets are left in place.
pub async fn delete_image(
    caller: ApiKeyAuth,
    State(state): State<AppState>,
    ApiPath(image_id): ApiPath<DbId>,
) -> AppResult<StatusCode> {
    let image = state
        .store
        .find_image(image_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Image",
            id: image_id,
        })?;
    if image.account_id != caller.account_id {
        return Err(CoreError::Forbidden("Image belongs to another account".into()).into());
    }

    if !state.store.delete_image(image_id, caller.account_id).await? {
        return Err(CoreError::NotFound {
            entity: "Image",
            id: image_id,
        }
        .into());
    }

    tracing::info!(image_id, account_id = caller.account_id, "Generated image deleted");
    Ok(StatusCode::NO_CONTENT)
}
