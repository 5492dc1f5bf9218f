//! Handlers for polling async render jobs.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use imprint_core::error::CoreError;
use imprint_core::types::{DbId, Timestamp};
use imprint_db::models::job::RenderJob;
use imprint_db::models::status::JobStatus;
use imprint_db::store::JobStore;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::auth::ApiKeyAuth;
use crate::middleware::extract::ApiPath;
use crate::state::AppState;

/// Poll view of a job. `image_url` is set once `done`, `error` once `failed`.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job_id: DbId,
    pub status: JobStatus,
    pub template_id: DbId,
    pub format: String,
    pub image_url: Option<String>,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<RenderJob> for JobResponse {
    fn from(job: RenderJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status(),
            template_id: job.template_id,
            format: job.format,
            image_url: job.image_url,
            error: job.error,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    caller: ApiKeyAuth,
    State(state): State<AppState>,
    ApiPath(job_id): ApiPath<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .store
        .find_job(job_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        })?;

    if !job.is_owned_by(caller.account_id) {
        return Err(CoreError::Forbidden("Job belongs to another account".into()).into());
    }

    Ok(Json(JobResponse::from(job)))
}
