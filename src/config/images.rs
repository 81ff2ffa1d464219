use serde::{Deserialize, Serialize};

use crate::rendition::DEFAULT_MAX_FILENAME_LENGTH;
use crate::transform::{DEFAULT_JPEG_QUALITY, DEFAULT_MAX_OUTPUT_PIXELS};

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

fn default_max_filename_length() -> usize {
    DEFAULT_MAX_FILENAME_LENGTH
}

fn default_max_output_pixels() -> u64 {
    DEFAULT_MAX_OUTPUT_PIXELS
}

fn default_renditions_dir() -> String {
    "images".to_string()
}

fn default_base_url() -> String {
    "/media/".to_string()
}

/// Rendition generation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// JPEG quality when the spec has no `jpegquality-*` stage (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Ceiling on rendition filenames, in characters
    #[serde(default = "default_max_filename_length")]
    pub max_filename_length: usize,

    /// Largest width x height an operation may resize to (to prevent abuse)
    #[serde(default = "default_max_output_pixels")]
    pub max_output_pixels: u64,

    /// Directory inside the media root that renditions are written to
    #[serde(default = "default_renditions_dir")]
    pub renditions_dir: String,

    /// URL prefix renditions are served from
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
            max_filename_length: default_max_filename_length(),
            max_output_pixels: default_max_output_pixels(),
            renditions_dir: default_renditions_dir(),
            base_url: default_base_url(),
        }
    }
}

impl ImageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(format!(
                "images.jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            ));
        }

        // ".<16 hex>.webp" is the longest suffix a rendition can get
        let longest_suffix = 1 + 16 + 1 + 4;
        if self.max_filename_length <= longest_suffix {
            return Err(format!(
                "images.max_filename_length must be greater than {}, got {}",
                longest_suffix, self.max_filename_length
            ));
        }

        if self.max_output_pixels == 0 {
            return Err("images.max_output_pixels must be greater than 0".to_string());
        }

        if self.renditions_dir.starts_with('/') || self.renditions_dir.split('/').any(|c| c == "..")
        {
            return Err(format!(
                "images.renditions_dir must be a relative path inside the media root, got '{}'",
                self.renditions_dir
            ));
        }

        Ok(())
    }
}
