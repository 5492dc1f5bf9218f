use std::path::PathBuf;
use std::time::Duration;

use imprint_render::context::{
    DEFAULT_IMAGE_FETCH_TIMEOUT, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_RENDER_TIMEOUT,
};
use imprint_render::RenderSettings;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight render jobs (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub render: RenderConfig,
    pub storage: StorageConfig,
    /// Emit logs as JSON lines instead of the human-readable format.
    pub log_json: bool,
}

/// Render engine limits.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub render_timeout_secs: u64,
    pub image_fetch_timeout_secs: u64,
    pub max_image_bytes: usize,
    /// Extra font files loaded on top of the system fonts.
    pub font_dir: Option<PathBuf>,
}

/// Where rendered assets are written.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// When unset, images are returned inline as `data:` URIs.
    pub s3_bucket: Option<String>,
    /// Public URL prefix objects are served from. Defaults to the
    /// virtual-hosted S3 endpoint of the bucket.
    pub s3_public_base_url: Option<String>,
    pub s3_prefix: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            render_timeout_secs: DEFAULT_RENDER_TIMEOUT.as_secs(),
            image_fetch_timeout_secs: DEFAULT_IMAGE_FETCH_TIMEOUT.as_secs(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            font_dir: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            s3_bucket: None,
            s3_public_base_url: None,
            s3_prefix: "generated".to_string(),
        }
    }
}

impl RenderConfig {
    /// Settings for the render context, system fonts included.
    pub fn settings(&self) -> RenderSettings {
        RenderSettings {
            render_timeout: Duration::from_secs(self.render_timeout_secs),
            image_fetch_timeout: Duration::from_secs(self.image_fetch_timeout_secs),
            max_image_bytes: self.max_image_bytes,
            font_dir: self.font_dir.clone(),
            system_fonts: true,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                    |
    /// |----------------------------|----------------------------|
    /// | `HOST`                     | `0.0.0.0`                  |
    /// | `PORT`                     | `3000`                     |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                       |
    /// | `RENDER_TIMEOUT_SECS`      | `10`                       |
    /// | `IMAGE_FETCH_TIMEOUT_SECS` | `5`                        |
    /// | `MAX_IMAGE_BYTES`          | `20971520`                 |
    /// | `FONT_DIR`                 | unset                      |
    /// | `S3_BUCKET`                | unset (inline data URIs)   |
    /// | `S3_PUBLIC_BASE_URL`       | `https://<bucket>.s3.amazonaws.com` |
    /// | `S3_PREFIX`                | `generated`                |
    /// | `LOG_FORMAT`               | `text` (`json` for JSON)   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let defaults = RenderConfig::default();
        let render = RenderConfig {
            render_timeout_secs: env_or("RENDER_TIMEOUT_SECS", defaults.render_timeout_secs),
            image_fetch_timeout_secs: env_or(
                "IMAGE_FETCH_TIMEOUT_SECS",
                defaults.image_fetch_timeout_secs,
            ),
            max_image_bytes: env_or("MAX_IMAGE_BYTES", defaults.max_image_bytes),
            font_dir: non_empty_var("FONT_DIR").map(PathBuf::from),
        };

        let storage = StorageConfig {
            s3_bucket: non_empty_var("S3_BUCKET"),
            s3_public_base_url: non_empty_var("S3_PUBLIC_BASE_URL"),
            s3_prefix: std::env::var("S3_PREFIX").unwrap_or_else(|_| "generated".into()),
        };

        let log_json = std::env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            render,
            storage,
            log_json,
        }
    }
}

fn env_or<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} is invalid: {e}")),
        Err(_) => default,
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_defaults_match_engine_defaults() {
        let settings = RenderConfig::default().settings();
        assert_eq!(settings.render_timeout, DEFAULT_RENDER_TIMEOUT);
        assert_eq!(settings.image_fetch_timeout, DEFAULT_IMAGE_FETCH_TIMEOUT);
        assert_eq!(settings.max_image_bytes, DEFAULT_MAX_IMAGE_BYTES);
        assert!(settings.system_fonts);
    }

    #[test]
    fn storage_defaults_to_inline() {
        let storage = StorageConfig::default();
        assert!(storage.s3_bucket.is_none());
        assert_eq!(storage.s3_prefix, "generated");
    }
}
