//! Persistence of rendered output.
//!
//! [`S3AssetStore`] uploads to a bucket and hands back a public URL.
//! [`DataUriStore`] is used when no bucket is configured and returns the
//! bytes inline as a `data:` URI.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use imprint_core::output::OutputFormat;

use crate::config::StorageConfig;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Asset upload to {bucket}/{key} failed: {message}")]
    Upload {
        bucket: String,
        key: String,
        message: String,
    },
}

/// Destination for encoded render output.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Persist `bytes` and return the URL they can be fetched from.
    async fn store(&self, bytes: Vec<u8>, format: OutputFormat) -> Result<String, StorageError>;
}

// ---------------------------------------------------------------------------
// S3
// ---------------------------------------------------------------------------

pub struct S3AssetStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
    public_base_url: String,
}

impl S3AssetStore {
    pub fn new(
        client: aws_sdk_s3::Client,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        public_base_url: Option<String>,
    ) -> Self {
        let bucket = bucket.into();
        let public_base_url = public_base_url
            .unwrap_or_else(|| format!("https://{bucket}.s3.amazonaws.com"))
            .trim_end_matches('/')
            .to_string();
        Self {
            client,
            bucket,
            prefix: prefix.into().trim_matches('/').to_string(),
            public_base_url,
        }
    }

    /// Build a store from the ambient AWS configuration (env, profile,
    /// instance metadata).
    pub async fn from_env(bucket: &str, config: &StorageConfig) -> Self {
        let sdk_config = aws_config::load_from_env().await;
        let client = aws_sdk_s3::Client::new(&sdk_config);
        Self::new(
            client,
            bucket,
            config.s3_prefix.clone(),
            config.s3_public_base_url.clone(),
        )
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base_url)
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn store(&self, bytes: Vec<u8>, format: OutputFormat) -> Result<String, StorageError> {
        let key = object_key(&self.prefix, format);
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(format.mime_type())
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                bucket: self.bucket.clone(),
                key: key.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        tracing::debug!(bucket = %self.bucket, key = %key, size, "Asset uploaded");
        Ok(self.public_url(&key))
    }
}

/// `{prefix}/{uuid}.{ext}`, or just the file name with an empty prefix.
pub fn object_key(prefix: &str, format: OutputFormat) -> String {
    let name = format!("{}.{}", uuid::Uuid::now_v7(), format.extension());
    if prefix.is_empty() {
        name
    } else {
        format!("{prefix}/{name}")
    }
}

// ---------------------------------------------------------------------------
// Inline
// ---------------------------------------------------------------------------

/// Returns the asset as `data:<mime>;base64,<payload>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataUriStore;

#[async_trait]
impl AssetStore for DataUriStore {
    async fn store(&self, bytes: Vec<u8>, format: OutputFormat) -> Result<String, StorageError> {
        Ok(data_uri(&bytes, format))
    }
}

pub fn data_uri(bytes: &[u8], format: OutputFormat) -> String {
    format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn data_uri_store_inlines_bytes() {
        let url = DataUriStore
            .store(b"%PDF-1.7".to_vec(), OutputFormat::Pdf)
            .await
            .unwrap();
        assert_eq!(url, "data:application/pdf;base64,JVBERi0xLjc=");
    }

    #[test]
    fn data_uri_uses_format_mime() {
        assert!(data_uri(&[1, 2, 3], OutputFormat::Png).starts_with("data:image/png;base64,"));
        assert!(data_uri(&[1, 2, 3], OutputFormat::Jpeg).starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn object_keys_are_prefixed_and_unique() {
        let a = object_key("generated", OutputFormat::Jpeg);
        let b = object_key("generated", OutputFormat::Jpeg);
        assert!(a.starts_with("generated/"));
        assert!(a.ends_with(".jpg"));
        assert_ne!(a, b);
        assert!(!object_key("", OutputFormat::Png).contains('/'));
    }
}
