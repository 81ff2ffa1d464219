// Configuration loading tests

use renditions::config::*;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_full_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        r#"
storage:
  media_root: /srv/media
  index_file: index/renditions.json
images:
  jpeg_quality: 90
  max_filename_length: 120
  max_output_pixels: 4000000
  renditions_dir: renditions
  base_url: https://cdn.example.com/
logging:
  level: debug
  format: pretty
"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();
    config.validate().unwrap();

    assert_eq!(config.storage.media_root, PathBuf::from("/srv/media"));
    assert_eq!(
        config.storage.index_path(),
        PathBuf::from("/srv/media/index/renditions.json")
    );
    assert_eq!(config.images.jpeg_quality, 90);
    assert_eq!(config.images.max_filename_length, 120);
    assert_eq!(config.images.max_output_pixels, 4_000_000);
    assert_eq!(config.images.renditions_dir, "renditions");
    assert_eq!(config.images.base_url, "https://cdn.example.com/");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Pretty);
}

#[test]
fn test_missing_file_is_an_error() {
    let err = Config::from_file("/nonexistent/renditions/config.yaml").unwrap_err();
    assert!(err.contains("Failed to read config file"));
}

#[test]
fn test_unknown_log_format_is_rejected() {
    let yaml = "logging:\n  format: xml\n";
    assert!(Config::from_yaml_with_env(yaml).is_err());
}

#[test]
fn test_config_serializes_back_to_yaml() {
    let config = Config::default();
    let yaml = serde_yaml::to_string(&config).unwrap();
    let parsed = Config::from_yaml_with_env(&yaml).unwrap();
    assert_eq!(parsed, config);
}
