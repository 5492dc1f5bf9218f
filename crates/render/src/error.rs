use std::time::Duration;

/// Failures of a single render call.
///
/// Image layers that fail to load are not errors: they are logged and left
/// empty. Everything here aborts the render with no output.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Render exceeded the {}s time limit", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Scene cannot be rendered: {0}")]
    InvalidScene(String),

    #[error("Failed to build scene tree: {0}")]
    Parse(String),

    #[error("Failed to allocate a {width}x{height} surface")]
    Surface { width: u32, height: u32 },

    #[error("Failed to encode output: {0}")]
    Encode(String),

    #[error("Render task failed: {0}")]
    Join(String),

    #[error("Render context setup failed: {0}")]
    Setup(String),
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        Self::Encode(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RenderError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Join(err.to_string())
    }
}
