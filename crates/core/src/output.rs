//! Output encodings and their per-request options.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

/// Default JPEG quality when the request does not specify one.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Encoding of a rendered scene.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
    Pdf,
}

impl OutputFormat {
    /// Wire / database name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Pdf => "pdf",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Pdf => "application/pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "pdf" => Ok(Self::Pdf),
            other => Err(CoreError::Validation(format!(
                "Unsupported format '{other}'. Must be one of: png, jpeg, pdf"
            ))),
        }
    }
}

/// Encoding options carried by a render request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RenderOptions {
    #[serde(default)]
    pub format: OutputFormat,
    /// JPEG quality, `1..=100`. Ignored for PNG and PDF.
    #[validate(range(min = 1, max = 100, message = "quality must be between 1 and 100"))]
    pub quality: Option<u8>,
}

impl RenderOptions {
    pub fn new(format: OutputFormat, quality: Option<u8>) -> Self {
        Self { format, quality }
    }

    /// Validate and return the options, mapping failures to [`CoreError`].
    pub fn validated(self) -> Result<Self, CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        Ok(self)
    }

    /// The quality to encode with, falling back to [`DEFAULT_JPEG_QUALITY`].
    pub fn effective_quality(&self) -> u8 {
        self.quality.unwrap_or(DEFAULT_JPEG_QUALITY)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("png".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("JPG".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!(" pdf ".parse::<OutputFormat>().unwrap(), OutputFormat::Pdf);
        assert_matches!("gif".parse::<OutputFormat>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn serde_accepts_jpg_alias() {
        let f: OutputFormat = serde_json::from_str(r#""jpg""#).unwrap();
        assert_eq!(f, OutputFormat::Jpeg);
        assert_eq!(serde_json::to_string(&f).unwrap(), r#""jpeg""#);
    }

    #[test]
    fn mime_types_match_formats() {
        assert_eq!(OutputFormat::Png.mime_type(), "image/png");
        assert_eq!(OutputFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(OutputFormat::Pdf.mime_type(), "application/pdf");
    }

    #[test]
    fn quality_range_is_enforced() {
        assert!(RenderOptions::new(OutputFormat::Jpeg, Some(1)).validated().is_ok());
        assert!(RenderOptions::new(OutputFormat::Jpeg, Some(100)).validated().is_ok());
        assert!(RenderOptions::new(OutputFormat::Jpeg, None).validated().is_ok());
        assert_matches!(
            RenderOptions::new(OutputFormat::Jpeg, Some(0)).validated(),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            RenderOptions::new(OutputFormat::Jpeg, Some(101)).validated(),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn default_quality_is_ninety() {
        assert_eq!(RenderOptions::default().effective_quality(), 90);
    }
}
