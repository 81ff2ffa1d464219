// Error types module

use thiserror::Error;

use crate::storage::StorageError;
use crate::store::StoreError;

/// Centralized error type for the rendition pipeline
///
/// Only `SourceImageUnavailable` has a recovery path (the placeholder
/// rendition returned by `RenditionService`). Every other variant aborts the
/// rendition attempt and is surfaced unchanged to the caller.
#[derive(Error, Debug)]
pub enum RenditionError {
    /// Malformed spec or unrecognised operation. `spec` is the offending
    /// stage, or the whole spec for structural errors.
    #[error("Invalid filter spec '{spec}': {reason}")]
    InvalidFilterSpec { spec: String, reason: String },

    /// The source bytes could not be opened, read or decoded
    #[error("Source image unavailable: {0}")]
    SourceImageUnavailable(String),

    /// The derived filename would exceed the configured ceiling
    #[error("Image file path is too long: {filename} (limit {max_len})")]
    OutputPathTooLong { filename: String, max_len: usize },

    /// The imaging backend could not produce valid output
    #[error("Failed to encode to {format}: {message}")]
    EncodeFailure { format: String, message: String },

    /// An operation could not be applied to the decoded image
    #[error("Operation '{operation}' failed: {message}")]
    TransformFailed { operation: String, message: String },

    /// Operation registry misuse (duplicate or malformed names)
    #[error("Operation registration failed: {0}")]
    Registration(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Rendition store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RenditionError {
    pub fn invalid_spec(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        RenditionError::InvalidFilterSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }

    pub fn source_unavailable(message: impl Into<String>) -> Self {
        RenditionError::SourceImageUnavailable(message.into())
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        RenditionError::EncodeFailure {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn transform_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        RenditionError::TransformFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether the rendition cache degrades this error to a placeholder
    /// instead of propagating it
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RenditionError::SourceImageUnavailable(_))
    }
}
