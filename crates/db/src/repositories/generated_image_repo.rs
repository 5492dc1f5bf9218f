//! Repository for the `generated_images` table.

use imprint_core::types::DbId;
use sqlx::PgPool;

use crate::models::generated_image::{CreateGeneratedImage, GeneratedImage};

const COLUMNS: &str = "id, account_id, template_id, variables, image_url, format, created_at";

/// Records of finished renders.
pub struct GeneratedImageRepo;

impl GeneratedImageRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateGeneratedImage,
    ) -> Result<GeneratedImage, sqlx::Error> {
        let query = format!(
            "INSERT INTO generated_images (account_id, template_id, variables, image_url, format) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GeneratedImage>(&query)
            .bind(input.account_id)
            .bind(input.template_id)
            .bind(input.variables_json())
            .bind(&input.image_url)
            .bind(input.format.as_str())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<GeneratedImage>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generated_images WHERE id = $1");
        sqlx::query_as::<_, GeneratedImage>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Newest first.
    pub async fn list_by_account(
        pool: &PgPool,
        account_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<GeneratedImage>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generated_images \
             WHERE account_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, GeneratedImage>(&query)
            .bind(account_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count_by_account(pool: &PgPool, account_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM generated_images WHERE account_id = $1")
            .bind(account_id)
            .fetch_one(pool)
            .await
    }

    /// Delete a record owned by `account_id`. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId, account_id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM generated_images WHERE id = $1 AND account_id = $2")
                .bind(id)
                .bind(account_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}
