//! Shared, read-only render resources.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use usvg::fontdb::Database;

use crate::error::RenderError;
use crate::fonts;

/// Default hard limit for one render call, fetches included.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Default limit for a single image fetch.
pub const DEFAULT_IMAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on a fetched image body (20 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Knobs for building a [`RenderContext`].
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub render_timeout: Duration,
    pub image_fetch_timeout: Duration,
    pub max_image_bytes: usize,
    /// Extra directory of `.ttf`/`.otf` files loaded on top of system fonts.
    pub font_dir: Option<PathBuf>,
    pub system_fonts: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            image_fetch_timeout: DEFAULT_IMAGE_FETCH_TIMEOUT,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            font_dir: None,
            system_fonts: true,
        }
    }
}

/// Fonts, HTTP client and limits shared by every render.
///
/// Cheap to clone; nothing in here is mutated after construction, so any
/// number of renders may use one context concurrently.
#[derive(Clone)]
pub struct RenderContext {
    fontdb: Arc<Database>,
    http: reqwest::Client,
    settings: RenderSettings,
}

impl RenderContext {
    pub fn new(settings: RenderSettings) -> Result<Self, RenderError> {
        let fontdb = fonts::build_font_database(settings.system_fonts, settings.font_dir.as_deref());
        let http = reqwest::Client::builder()
            .timeout(settings.image_fetch_timeout)
            .user_agent(concat!("imprint-render/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RenderError::Setup(e.to_string()))?;
        Ok(Self {
            fontdb,
            http,
            settings,
        })
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Number of font faces available to text layers.
    pub fn font_count(&self) -> usize {
        self.fontdb.len()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn usvg_options(&self) -> usvg::Options<'static> {
        usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            font_resolver: fonts::font_resolver(),
            ..Default::default()
        }
    }
}
