//! File storage backends
//!
//! Source images are read and renditions written through the [`Storage`]
//! trait. Names are `/`-separated relative paths such as
//! `images/42/photo.2b6a1f3e.jpg`.

pub mod fs;
pub mod memory;

use std::io::{Read, Seek, SeekFrom};
use std::path::{Component, Path};
use thiserror::Error;

pub use fs::FileSystemStorage;
pub use memory::MemoryStorage;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file name: {0}")]
    InvalidName(String),
}

/// A readable, seekable handle released when dropped
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

pub trait Storage: Send + Sync {
    /// Open `name` for reading
    fn open(&self, name: &str) -> Result<Box<dyn ReadSeek>, StorageError>;

    /// Store `data` under `name`, replacing any existing file, and return
    /// the name it was stored as
    ///
    /// Readers never observe a partially written file.
    fn save(&self, name: &str, data: &[u8]) -> Result<String, StorageError>;

    /// Remove `name`. Deleting a missing file succeeds.
    fn delete(&self, name: &str) -> Result<(), StorageError>;

    fn exists(&self, name: &str) -> bool;

    /// Size in bytes
    fn size(&self, name: &str) -> Result<u64, StorageError>;
}

/// Open `name`, rewind it, and hand the reader to `f`
///
/// The handle is dropped when `f` returns, on success and on error alike.
pub fn with_reader<S, T, F>(storage: &S, name: &str, f: F) -> Result<T, StorageError>
where
    S: Storage + ?Sized,
    F: FnOnce(&mut dyn ReadSeek) -> Result<T, StorageError>,
{
    let mut reader = storage.open(name)?;
    reader.seek(SeekFrom::Start(0))?;
    f(reader.as_mut())
}

/// Reject names that are empty, absolute, or escape the storage root
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() {
        return Err(StorageError::InvalidName("empty name".to_string()));
    }

    let path = Path::new(name);
    let all_normal = path
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if !all_normal || name.ends_with('/') {
        return Err(StorageError::InvalidName(name.to_string()));
    }

    Ok(())
}
