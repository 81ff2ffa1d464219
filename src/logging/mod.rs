// Logging module for structured logging using the tracing crate

use std::error::Error;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Build the event filter: `RUST_LOG` when set, the configured level otherwise
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, Box<dyn Error + Send + Sync>> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(&config.level)?),
    }
}

/// Initialize the tracing subscriber for structured logging
///
/// Logs go to stderr so stdout stays free for command output. Calling this
/// again once a global subscriber is installed is a no-op.
///
/// # Examples
///
/// ```
/// use renditions::config::LoggingConfig;
/// use renditions::logging::init_subscriber;
///
/// init_subscriber(&LoggingConfig::default()).expect("Failed to initialize logging");
/// tracing::info!("Application started");
/// ```
pub fn init_subscriber(config: &LoggingConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };

    // Losing the race to another initializer is fine
    if result.is_err() && tracing::dispatcher::has_been_set() {
        return Ok(());
    }
    result
}
