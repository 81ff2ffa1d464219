// Logging module unit tests

use renditions::config::{LogFormat, LoggingConfig};
use renditions::logging::init_subscriber;

#[test]
fn test_init_subscriber_succeeds() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        format: LogFormat::Pretty,
    };
    assert!(init_subscriber(&config).is_ok());
}

#[test]
fn test_logging_after_init_works() {
    let _ = init_subscriber(&LoggingConfig::default());

    tracing::info!(image_id = 1, spec = "width-100", "Rendition created");
    tracing::warn!(source = "original_images/gone.jpg", "Source image unavailable");
    tracing::debug!("Rendition cache hit");
}

#[test]
fn test_repeated_init_is_harmless() {
    for _ in 0..3 {
        assert!(init_subscriber(&LoggingConfig::default()).is_ok());
    }
}
