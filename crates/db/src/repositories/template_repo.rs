//! Repository for the `templates` table.

use imprint_core::types::DbId;
use sqlx::PgPool;

use crate::models::template::{CreateTemplate, Template};

const COLUMNS: &str = "id, account_id, name, scene, created_at, updated_at";

/// Read access to templates, plus an insert used for seeding.
pub struct TemplateRepo;

impl TemplateRepo {
    pub async fn create(pool: &PgPool, input: &CreateTemplate) -> Result<Template, sqlx::Error> {
        let scene = serde_json::to_value(&input.scene)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let query = format!(
            "INSERT INTO templates (account_id, name, scene) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Template>(&query)
            .bind(input.account_id)
            .bind(&input.name)
            .bind(scene)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Template>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM templates WHERE id = $1");
        sqlx::query_as::<_, Template>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
