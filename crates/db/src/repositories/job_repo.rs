//! Repository for the `render_jobs` table.
//!
//! Every transition is a conditional update on the expected prior status,
//! so a job can only move forward along
//! `pending -> processing -> done | failed` (or `pending -> failed`).
//! Methods return `false` when the job was not in the expected state.

use imprint_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::{CreateRenderJob, RenderJob};
use crate::models::status::JobStatus;

const COLUMNS: &str = "\
    id, account_id, template_id, variables, format, quality, status_id, \
    image_url, error, created_at, updated_at";

/// Async render job persistence.
pub struct RenderJobRepo;

impl RenderJobRepo {
    /// Insert a new job in `pending`.
    pub async fn create(pool: &PgPool, input: &CreateRenderJob) -> Result<RenderJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO render_jobs (account_id, template_id, variables, format, quality, status_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RenderJob>(&query)
            .bind(input.account_id)
            .bind(input.template_id)
            .bind(input.variables_json())
            .bind(input.options.format.as_str())
            .bind(input.quality())
            .bind(JobStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<RenderJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM render_jobs WHERE id = $1");
        sqlx::query_as::<_, RenderJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// `pending -> processing`.
    pub async fn mark_processing(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE render_jobs SET status_id = $2 WHERE id = $1 AND status_id = $3")
                .bind(id)
                .bind(JobStatus::Processing.id())
                .bind(JobStatus::Pending.id())
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `processing -> done` with the stored asset URL.
    pub async fn complete(pool: &PgPool, id: DbId, image_url: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE render_jobs SET status_id = $2, image_url = $3 \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(JobStatus::Done.id())
        .bind(image_url)
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `pending | processing -> failed` with an error message.
    pub async fn fail(pool: &PgPool, id: DbId, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE render_jobs SET status_id = $2, error = $3 \
             WHERE id = $1 AND status_id IN ($4, $5)",
        )
        .bind(id)
        .bind(JobStatus::Failed.id())
        .bind(error)
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fail every non-terminal job. Called once at startup, since no worker
    /// from a previous process can still be running them.
    pub async fn fail_orphaned(pool: &PgPool, error: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE render_jobs SET status_id = $1, error = $2 \
             WHERE status_id IN ($3, $4)",
        )
        .bind(JobStatus::Failed.id())
        .bind(error)
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
