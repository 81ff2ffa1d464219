use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{validate_name, ReadSeek, Storage, StorageError};

/// Storage held entirely in memory
///
/// Counts reads and writes, which makes it handy for checking how often the
/// pipeline actually touches a file.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<String, Bytes>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a file in place without going through `save`
    pub fn insert(&self, name: impl Into<String>, data: impl Into<Bytes>) {
        self.files.write().insert(name.into(), data.into());
    }

    pub fn remove(&self, name: &str) -> Option<Bytes> {
        self.files.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Bytes> {
        self.files.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    /// Names of every stored file, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of successful `open` calls
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `save` calls
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Storage for MemoryStorage {
    fn open(&self, name: &str) -> Result<Box<dyn ReadSeek>, StorageError> {
        let data = self
            .get(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(Cursor::new(data)))
    }

    fn save(&self, name: &str, data: &[u8]) -> Result<String, StorageError> {
        validate_name(name)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.insert(name, Bytes::copy_from_slice(data));
        Ok(name.to_string())
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        self.remove(name);
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    fn size(&self, name: &str) -> Result<u64, StorageError> {
        self.files
            .read()
            .get(name)
            .map(|data| data.len() as u64)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }
}
