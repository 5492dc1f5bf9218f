//! Image source loading: `http(s)://` downloads and inline `data:` URIs.

use base64::Engine;

use crate::context::RenderContext;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("unsupported image source scheme: {0}")]
    UnsupportedScheme(String),

    #[error("malformed data URI: {0}")]
    InvalidDataUri(String),

    #[error("image request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image request returned HTTP {0}")]
    Status(u16),

    #[error("image exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("image fetch timed out")]
    Timeout,
}

/// Load the raw bytes behind an image layer's `sourceUrl`.
///
/// Any origin is accepted. Downloads are bounded by the context's fetch
/// timeout and byte cap.
pub async fn fetch_image(ctx: &RenderContext, source: &str) -> Result<Vec<u8>, FetchError> {
    let source = source.trim();
    if let Some(rest) = source.strip_prefix("data:") {
        return decode_data_uri(rest, ctx.settings().max_image_bytes);
    }
    if !(source.starts_with("http://") || source.starts_with("https://")) {
        let scheme = source.split(':').next().unwrap_or_default();
        return Err(FetchError::UnsupportedScheme(scheme.to_string()));
    }

    let timeout = ctx.settings().image_fetch_timeout;
    tokio::time::timeout(timeout, download(ctx, source))
        .await
        .map_err(|_| FetchError::Timeout)?
}

async fn download(ctx: &RenderContext, url: &str) -> Result<Vec<u8>, FetchError> {
    let limit = ctx.settings().max_image_bytes;
    let mut response = ctx.http().get(url).send().await?;
    if !response.status().is_success() {
        return Err(FetchError::Status(response.status().as_u16()));
    }
    if response
        .content_length()
        .is_some_and(|len| len > limit as u64)
    {
        return Err(FetchError::TooLarge { limit });
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            return Err(FetchError::TooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Decode the part of a data URI after `data:`.
fn decode_data_uri(rest: &str, limit: usize) -> Result<Vec<u8>, FetchError> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::InvalidDataUri("missing ','".into()))?;
    let bytes = if meta.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| FetchError::InvalidDataUri(e.to_string()))?
    } else {
        payload.as_bytes().to_vec()
    };
    if bytes.len() > limit {
        return Err(FetchError::TooLarge { limit });
    }
    Ok(bytes)
}
