//! Rendition lookup tables
//!
//! A [`RenditionStore`] maps `(image id, filter spec, vary key)` to the
//! stored rendition. `get_or_create` is atomic per key: when two callers
//! race to insert the same key, both get the row that landed first.

pub mod index;
pub mod json;
pub mod memory;
pub mod stats;

use thiserror::Error;

use crate::rendition::{Rendition, RenditionKey};

pub use index::RenditionIndex;
pub use json::JsonRenditionStore;
pub use memory::MemoryRenditionStore;
pub use stats::StoreStats;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Index corrupted: {0}")]
    IndexCorrupted(String),
}

pub trait RenditionStore: Send + Sync {
    fn get(&self, key: &RenditionKey) -> Result<Option<Rendition>, StoreError>;

    /// Insert `rendition` unless its key is already present
    ///
    /// Returns the stored row and whether this call created it.
    fn get_or_create(&self, rendition: Rendition) -> Result<(Rendition, bool), StoreError>;

    /// Every rendition of one source image, ordered by filter spec
    fn list_for_image(&self, image_id: u64) -> Result<Vec<Rendition>, StoreError>;

    /// Remove every rendition of one source image and return them
    fn delete_for_image(&self, image_id: u64) -> Result<Vec<Rendition>, StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> StoreStats;
}
