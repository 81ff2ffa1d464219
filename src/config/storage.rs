use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_index_file() -> PathBuf {
    PathBuf::from("renditions.json")
}

/// Where originals, renditions and the rendition index live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for source images and renditions
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,

    /// Rendition index file, relative to `media_root` unless absolute
    #[serde(default = "default_index_file")]
    pub index_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_root: default_media_root(),
            index_file: default_index_file(),
        }
    }
}

impl StorageConfig {
    /// Resolved location of the rendition index
    pub fn index_path(&self) -> PathBuf {
        if self.index_file.is_absolute() {
            self.index_file.clone()
        } else {
            self.media_root.join(&self.index_file)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.media_root.as_os_str().is_empty() {
            return Err("storage.media_root cannot be empty".to_string());
        }
        if self.index_file.as_os_str().is_empty() {
            return Err("storage.index_file cannot be empty".to_string());
        }
        Ok(())
    }
}
