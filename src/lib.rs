// Renditions library
//
// Filter specs such as `fill-200x200|format-webp` are parsed into
// operations, run against a source image, and the result is stored as a
// content-addressed rendition file.

pub mod config;
pub mod error;
pub mod filters;
pub mod logging;
pub mod rendition;
pub mod storage;
pub mod store;
pub mod transform;

pub use error::RenditionError;
pub use filters::{Filter, OperationRegistry};
pub use rendition::{FocalPoint, Rendition, RenditionService, SourceImage};
