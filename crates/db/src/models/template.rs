//! Template model. Templates are authored by the editor service; the render
//! core only reads them.

use imprint_core::error::CoreError;
use imprint_core::scene::SceneDocument;
use imprint_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `templates` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Template {
    pub id: DbId,
    pub account_id: DbId,
    pub name: String,
    /// Serialized [`SceneDocument`].
    pub scene: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Template {
    /// Decode the stored scene document.
    pub fn scene_document(&self) -> Result<SceneDocument, CoreError> {
        SceneDocument::from_json(&self.scene)
    }

    pub fn is_owned_by(&self, account_id: DbId) -> bool {
        self.account_id == account_id
    }
}

/// DTO for inserting a template (seeding and tests).
#[derive(Debug, Clone)]
pub struct CreateTemplate {
    pub account_id: DbId,
    pub name: String,
    pub scene: SceneDocument,
}
