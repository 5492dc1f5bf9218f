//! Scene rasterization for the Imprint render service.
//!
//! A [`SceneDocument`](imprint_core::scene::SceneDocument) is lowered to SVG
//! markup ([`svg`]), parsed by `usvg` against the context's font database,
//! painted by `resvg` into a CPU pixmap ([`raster`]) and encoded as PNG, JPEG
//! or PDF ([`encode`], [`pdf`]). Remote images are fetched up front
//! ([`fetch`]) and filtered with the `image` crate ([`images`]).
//!
//! [`Renderer`] ties the stages together behind a wall-clock timeout and is
//! exposed to callers through the [`RenderEngine`] trait.

pub mod context;
pub mod encode;
pub mod error;
pub mod fetch;
pub mod fonts;
pub mod images;
pub mod pdf;
pub mod raster;
pub mod renderer;
pub mod svg;

pub use context::{RenderContext, RenderSettings};
pub use error::RenderError;
pub use renderer::{RenderEngine, RenderOutput, Renderer};
