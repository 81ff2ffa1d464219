//! Filter specs and the operations they describe
//!
//! A spec such as `fill-200x200-c50|format-webp` is split into stages,
//! each stage is resolved through an [`OperationRegistry`], and the result
//! is an immutable [`Filter`] that can be shared between threads.

pub mod filter;
pub mod operation;
pub mod rect;
pub mod registry;
pub mod spec;

pub use filter::{short_sha1, Filter};
pub use operation::{BuiltinOperation, CropBox, ExternalOperation, Operation};
pub use rect::Rect;
pub use registry::{OperationFactory, OperationRegistry};
pub use spec::{parse_stages, Stage};
