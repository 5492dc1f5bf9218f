//! The render pipeline behind `POST /api/v1/images`.
//!
//! Both paths reserve one call against the caller's quota before anything
//! else is looked up, and settle the reservation exactly once: committed
//! after the generated image is persisted, released on any failure. The
//! reservation lives in a [`QuotaHold`], so a request dropped mid-render
//! releases it as well.
//!
//! ```text
//! reserve -> load template -> substitute -> render -> store -> persist -> commit -> webhook
//! ```

use std::time::Instant;

use imprint_core::error::CoreError;
use imprint_core::output::RenderOptions;
use imprint_core::quota::Usage;
use imprint_core::scene::SceneDocument;
use imprint_core::substitution::{substitute, VariableMap};
use imprint_core::types::DbId;
use imprint_db::models::generated_image::{CreateGeneratedImage, GeneratedImage};
use imprint_db::models::job::{CreateRenderJob, RenderJob};
use imprint_db::store::{ImageStore, JobStore, TemplateStore};
use imprint_events::ImageGenerated;

use crate::error::{AppError, AppResult};
use crate::quota::QuotaHold;
use crate::state::AppState;

/// A validated render request.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub template_id: DbId,
    pub variables: VariableMap,
    pub options: RenderOptions,
}

/// Result of a synchronous render.
#[derive(Debug)]
pub struct RenderOutcome {
    pub image: GeneratedImage,
    /// Usage after this render was counted.
    pub usage: Usage,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Render, store and record an image while the caller waits.
pub async fn render_now(
    state: &AppState,
    account_id: DbId,
    request: RenderRequest,
) -> AppResult<RenderOutcome> {
    let hold = QuotaHold::acquire(&state.store, account_id).await?;

    let scene = match load_scene(state, account_id, request.template_id).await {
        Ok(scene) => scene,
        Err(e) => {
            hold.release().await;
            return Err(e);
        }
    };

    let image = match produce(state, account_id, &request, &scene).await {
        Ok(image) => image,
        Err(e) => {
            hold.release().await;
            return Err(e);
        }
    };

    let usage = hold.commit().await?;
    notify(state, &image, None);

    Ok(RenderOutcome { image, usage })
}

/// Accept the request as a `pending` job and render it in the background.
///
/// Quota and template checks happen before the job exists, so a caller
/// over its limit or using a foreign template gets the error directly.
pub async fn submit_job(
    state: &AppState,
    account_id: DbId,
    request: RenderRequest,
) -> AppResult<RenderJob> {
    let hold = QuotaHold::acquire(&state.store, account_id).await?;

    let accepted = async {
        let scene = load_scene(state, account_id, request.template_id).await?;
        let job = state
            .store
            .create_job(&CreateRenderJob {
                account_id,
                template_id: request.template_id,
                variables: request.variables.clone(),
                options: request.options,
            })
            .await?;
        Ok::<_, AppError>((scene, job))
    }
    .await;

    let (scene, job) = match accepted {
        Ok(accepted) => accepted,
        Err(e) => {
            hold.release().await;
            return Err(e);
        }
    };

    tracing::info!(
        job_id = job.id,
        account_id,
        template_id = request.template_id,
        format = %request.options.format,
        "Render job accepted",
    );

    let task_state = state.clone();
    let job_id = job.id;
    state.jobs.submit(job_id, async move {
        run_job(task_state, job_id, account_id, request, scene, hold).await;
    });

    Ok(job)
}

// ---------------------------------------------------------------------------
// Background execution
// ---------------------------------------------------------------------------

async fn run_job(
    state: AppState,
    job_id: DbId,
    account_id: DbId,
    request: RenderRequest,
    scene: SceneDocument,
    hold: QuotaHold,
) {
    match state.store.mark_processing(job_id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(job_id, "Job was no longer pending, skipping");
            hold.release().await;
            return;
        }
        Err(e) => {
            tracing::error!(job_id, error = %e, "Failed to start job");
            hold.release().await;
            return;
        }
    }

    let image = match produce(&state, account_id, &request, &scene).await {
        Ok(image) => image,
        Err(e) => {
            hold.release().await;
            let (code, message) = (e.code(), e.public_message());
            match state.store.fail_job(job_id, &message).await {
                Ok(_) => tracing::warn!(job_id, code, error = %e, "Render job failed"),
                Err(db) => tracing::error!(job_id, error = %db, "Failed to record job failure"),
            }
            return;
        }
    };

    if let Err(e) = hold.commit().await {
        tracing::error!(job_id, account_id, error = %e, "Failed to count render against quota");
    }

    match state.store.complete_job(job_id, &image.image_url).await {
        Ok(true) => {
            tracing::info!(job_id, image_id = image.id, "Render job done");
            notify(&state, &image, Some(job_id));
        }
        Ok(false) => tracing::warn!(job_id, "Job left processing before completion"),
        Err(e) => tracing::error!(job_id, error = %e, "Failed to record job completion"),
    }
}

// ---------------------------------------------------------------------------
// Pipeline steps
// ---------------------------------------------------------------------------

/// Fetch the template, check ownership and parse its scene.
async fn load_scene(
    state: &AppState,
    account_id: DbId,
    template_id: DbId,
) -> AppResult<SceneDocument> {
    let template = state
        .store
        .find_template(template_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Template",
            id: template_id,
        })?;

    if !template.is_owned_by(account_id) {
        return Err(CoreError::Forbidden("Template belongs to another account".into()).into());
    }

    let scene = template.scene_document()?;
    scene.validate()?;
    Ok(scene)
}

/// Substitute, render, upload and persist. Leaves quota untouched.
async fn produce(
    state: &AppState,
    account_id: DbId,
    request: &RenderRequest,
    scene: &SceneDocument,
) -> AppResult<GeneratedImage> {
    let started = Instant::now();
    let resolved = substitute(scene, &request.variables);

    let output = state.renderer.render(&resolved, &request.options).await?;
    let size = output.bytes.len();
    let image_url = state.assets.store(output.bytes, output.format).await?;

    let image = state
        .store
        .insert_image(&CreateGeneratedImage {
            account_id,
            template_id: request.template_id,
            variables: request.variables.clone(),
            image_url,
            format: output.format,
        })
        .await?;

    tracing::info!(
        image_id = image.id,
        account_id,
        template_id = request.template_id,
        format = %output.format,
        size,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Image generated",
    );
    Ok(image)
}

/// Fire the `image.generated` webhook without waiting for delivery.
fn notify(state: &AppState, image: &GeneratedImage, job_id: Option<DbId>) {
    let event = ImageGenerated {
        image_id: image.id,
        template_id: image.template_id,
        image_url: image.image_url.clone(),
        format: image.format.clone(),
        job_id,
    };
    drop(state.webhooks.dispatch(image.account_id, event.into()));
}
