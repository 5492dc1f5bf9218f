//! Render job models for the asynchronous render path.

use imprint_core::output::{OutputFormat, RenderOptions};
use imprint_core::substitution::VariableMap;
use imprint_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{JobStatus, StatusId};

/// A row from the `render_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RenderJob {
    pub id: DbId,
    pub account_id: DbId,
    pub template_id: DbId,
    pub variables: serde_json::Value,
    pub format: String,
    pub quality: Option<i16>,
    pub status_id: StatusId,
    /// Set only once the job is `done`.
    pub image_url: Option<String>,
    /// Set only once the job has `failed`.
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RenderJob {
    /// The job's status; unknown ids are reported as failed.
    pub fn status(&self) -> JobStatus {
        JobStatus::from_id(self.status_id).unwrap_or(JobStatus::Failed)
    }

    pub fn is_owned_by(&self, account_id: DbId) -> bool {
        self.account_id == account_id
    }

    /// Decode the stored variable snapshot.
    pub fn variable_map(&self) -> VariableMap {
        serde_json::from_value(self.variables.clone()).unwrap_or_default()
    }

    /// Decode the stored encoding options.
    pub fn render_options(&self) -> RenderOptions {
        let format = self.format.parse().unwrap_or(OutputFormat::Png);
        let quality = self.quality.and_then(|q| u8::try_from(q).ok());
        RenderOptions::new(format, quality)
    }
}

/// DTO for enqueueing a render job (always created `pending`).
#[derive(Debug, Clone)]
pub struct CreateRenderJob {
    pub account_id: DbId,
    pub template_id: DbId,
    pub variables: VariableMap,
    pub options: RenderOptions,
}

impl CreateRenderJob {
    pub fn variables_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.variables).unwrap_or_default()
    }

    pub fn quality(&self) -> Option<i16> {
        self.options.quality.map(i16::from)
    }
}
