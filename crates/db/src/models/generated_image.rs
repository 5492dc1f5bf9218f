//! Generated image records: one per successful render.

use imprint_core::output::OutputFormat;
use imprint_core::substitution::VariableMap;
use imprint_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `generated_images` table. Immutable once written.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GeneratedImage {
    pub id: DbId,
    pub account_id: DbId,
    pub template_id: DbId,
    /// Snapshot of the substitutions used for this render.
    pub variables: serde_json::Value,
    pub image_url: String,
    pub format: String,
    pub created_at: Timestamp,
}

/// DTO for recording a finished render.
#[derive(Debug, Clone)]
pub struct CreateGeneratedImage {
    pub account_id: DbId,
    pub template_id: DbId,
    pub variables: VariableMap,
    pub image_url: String,
    pub format: OutputFormat,
}

impl CreateGeneratedImage {
    pub fn variables_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.variables).unwrap_or_default()
    }
}
