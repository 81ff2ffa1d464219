//! Output formats and output-format selection

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Formats a rendition can be encoded to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }

    /// File extension used in rendition filenames
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }

    pub fn supports_transparency(&self) -> bool {
        !matches!(self, Self::Jpeg)
    }

    /// The output format matching a decoded format, if it is one we encode
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::WebP => Some(Self::WebP),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "gif" => Ok(OutputFormat::Gif),
            "webp" => Ok(OutputFormat::WebP),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

/// Decide which format a rendition is encoded to
///
/// An explicitly requested format always wins. Otherwise the original
/// format is kept, except that BMP and still GIFs become PNG and anything
/// we cannot encode falls back to PNG.
pub fn select_output_format(
    original: ImageFormat,
    requested: Option<OutputFormat>,
    animated: bool,
) -> OutputFormat {
    if let Some(format) = requested {
        return format;
    }

    match original {
        ImageFormat::Gif if animated => OutputFormat::Gif,
        ImageFormat::Gif | ImageFormat::Bmp => OutputFormat::Png,
        other => OutputFormat::from_image_format(other).unwrap_or(OutputFormat::Png),
    }
}
