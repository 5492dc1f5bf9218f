//! The render entry point.

use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use imprint_core::output::{OutputFormat, RenderOptions};
use imprint_core::scene::{ImageLayer, LayerKind, SceneDocument};

use crate::context::RenderContext;
use crate::error::RenderError;
use crate::images::{self, EmbeddedImage, ImageLoadError};
use crate::svg::{self, LayerImages};
use crate::{encode, fetch, raster};

/// Encoded output of one render.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

impl RenderOutput {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

/// Anything that can turn a resolved scene into encoded bytes.
///
/// The API layer holds an `Arc<dyn RenderEngine>` so tests can substitute
/// engines that fail or stall on demand.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn render(
        &self,
        scene: &SceneDocument,
        options: &RenderOptions,
    ) -> Result<RenderOutput, RenderError>;
}

/// CPU renderer backed by `usvg`/`resvg`.
#[derive(Clone)]
pub struct Renderer {
    ctx: RenderContext,
}

impl Renderer {
    pub fn new(ctx: RenderContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    /// Render `scene` under the context's wall-clock limit.
    ///
    /// On timeout nothing is returned. A rasterization already handed to the
    /// blocking pool runs to completion in the background and is discarded.
    pub async fn render_scene(
        &self,
        scene: &SceneDocument,
        options: &RenderOptions,
    ) -> Result<RenderOutput, RenderError> {
        let started = Instant::now();
        let limit = self.ctx.settings().render_timeout;
        let result = tokio::time::timeout(limit, self.render_unbounded(scene, options))
            .await
            .unwrap_or(Err(RenderError::Timeout(limit)));

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(output) => tracing::info!(
                format = %options.format,
                width = output.width,
                height = output.height,
                bytes = output.bytes.len(),
                elapsed_ms,
                "Scene rendered",
            ),
            Err(e) => tracing::warn!(format = %options.format, elapsed_ms, error = %e, "Render failed"),
        }
        result
    }

    async fn render_unbounded(
        &self,
        scene: &SceneDocument,
        options: &RenderOptions,
    ) -> Result<RenderOutput, RenderError> {
        scene
            .validate()
            .map_err(|e| RenderError::InvalidScene(e.to_string()))?;

        let images = self.load_images(scene).await;
        let markup = svg::scene_to_svg(scene, &images);
        let (width, height) = (scene.canvas_width, scene.canvas_height);
        let ctx = self.ctx.clone();
        let options = *options;

        let bytes = tokio::task::spawn_blocking(move || {
            let pixmap = raster::rasterize(&ctx, &markup, width, height)?;
            encode::encode(&pixmap, &options)
        })
        .await??;

        Ok(RenderOutput {
            bytes,
            format: options.format,
            width,
            height,
        })
    }

    /// Fetch and prepare every paintable image layer concurrently.
    /// Failures are logged and the layer is left out.
    async fn load_images(&self, scene: &SceneDocument) -> LayerImages {
        let loads = scene
            .layers
            .iter()
            .enumerate()
            .filter(|(_, layer)| layer.is_paintable())
            .filter_map(|(index, layer)| match &layer.kind {
                LayerKind::Image(image) => Some((index, image)),
                _ => None,
            })
            .map(|(index, image)| async move { (index, image, self.load_image(image).await) });

        join_all(loads)
            .await
            .into_iter()
            .filter_map(|(index, layer, result)| match result {
                Ok(embedded) => Some((index, embedded)),
                Err(e) => {
                    tracing::warn!(
                        layer = index,
                        source = %source_label(&layer.source_url),
                        error = %e,
                        "Image layer skipped",
                    );
                    None
                }
            })
            .collect()
    }

    async fn load_image(&self, layer: &ImageLayer) -> Result<EmbeddedImage, ImageLoadError> {
        let bytes = fetch::fetch_image(&self.ctx, &layer.source_url).await?;
        let filters = layer.filters.clone();
        let embedded =
            tokio::task::spawn_blocking(move || images::prepare_image(&bytes, filters.as_ref()))
                .await??;
        Ok(embedded)
    }
}

#[async_trait]
impl RenderEngine for Renderer {
    async fn render(
        &self,
        scene: &SceneDocument,
        options: &RenderOptions,
    ) -> Result<RenderOutput, RenderError> {
        self.render_scene(scene, options).await
    }
}

/// Short form of an image source for logs; data URIs can be megabytes.
fn source_label(source: &str) -> &str {
    if source.starts_with("data:") {
        "data:..."
    } else {
        source
    }
}
