// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod images;
pub mod logging;
pub mod storage;

pub use images::ImageConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use storage::StorageConfig;

/// Top-level configuration; every section is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse YAML, replacing `${VAR_NAME}` with environment variables first
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        let mut missing = None;
        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    missing.get_or_insert_with(|| var_name.to_string());
                    String::new()
                }
            }
        });

        if let Some(var_name) = missing {
            return Err(format!(
                "Environment variable '{}' is referenced but not set",
                var_name
            ));
        }

        // An empty document is a config with every default
        if substituted.trim().is_empty() {
            return Ok(Config::default());
        }

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.images.validate()?;

        if self.logging.level.trim().is_empty() {
            return Err("logging.level cannot be empty".to_string());
        }

        Ok(())
    }
}
