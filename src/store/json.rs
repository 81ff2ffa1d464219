//! Rendition store persisted as a JSON index file
//!
//! The whole index is rewritten after every mutation (temp file + rename),
//! so a crash never leaves a half-written index behind. Suitable for a
//! single process; use a database-backed store when several processes
//! share one media root.

use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

use super::index::{IndexSnapshot, RenditionIndex, INDEX_VERSION};
use super::stats::StoreStatsTracker;
use super::{RenditionStore, StoreError, StoreStats};
use crate::rendition::{Rendition, RenditionKey};

pub struct JsonRenditionStore {
    path: PathBuf,
    index: RenditionIndex,
    stats: StoreStatsTracker,
    /// Serializes mutate-then-persist sequences
    write_lock: Mutex<()>,
}

impl JsonRenditionStore {
    /// Open the index at `path`
    ///
    /// A missing file yields an empty store. An unparseable file is logged
    /// and replaced on the next write. A file written by a newer format
    /// version is refused so it is never overwritten.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let index = Self::load(&path)?;

        tracing::debug!(
            path = %path.display(),
            entries = index.len(),
            "Loaded rendition index"
        );

        Ok(Self {
            path,
            index,
            stats: StoreStatsTracker::new(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<RenditionIndex, StoreError> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RenditionIndex::new());
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: IndexSnapshot = match serde_json::from_slice(&data) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse rendition index, starting with an empty index"
                );
                return Ok(RenditionIndex::new());
            }
        };

        if snapshot.version > INDEX_VERSION {
            return Err(StoreError::IndexCorrupted(format!(
                "{} has version {}, this build reads up to {}",
                path.display(),
                snapshot.version,
                INDEX_VERSION
            )));
        }

        Ok(RenditionIndex::from_snapshot(snapshot))
    }

    fn persist(&self) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&self.index.snapshot())?;
        write_file_atomic(&self.path, &json)
    }
}

fn write_file_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
    let temp_path = PathBuf::from(temp_name);

    fs::write(&temp_path, data)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

impl RenditionStore for JsonRenditionStore {
    fn get(&self, key: &RenditionKey) -> Result<Option<Rendition>, StoreError> {
        let found = self.index.get(key);
        self.stats.record_lookup(found.is_some());
        Ok(found)
    }

    fn get_or_create(&self, rendition: Rendition) -> Result<(Rendition, bool), StoreError> {
        let _guard = self.write_lock.lock();
        let (stored, created) = self.index.get_or_insert(rendition);
        if created {
            // Memory must never hold a row the file does not
            if let Err(e) = self.persist() {
                self.index.remove(&stored.key());
                return Err(e);
            }
            self.stats.increment_created();
        }
        Ok((stored, created))
    }

    fn list_for_image(&self, image_id: u64) -> Result<Vec<Rendition>, StoreError> {
        Ok(self.index.for_image(image_id))
    }

    fn delete_for_image(&self, image_id: u64) -> Result<Vec<Rendition>, StoreError> {
        let _guard = self.write_lock.lock();
        let removed = self.index.remove_for_image(image_id);
        if !removed.is_empty() {
            if let Err(e) = self.persist() {
                self.index.restore(removed);
                return Err(e);
            }
        }
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn stats(&self) -> StoreStats {
        self.stats.snapshot(self.index.len())
    }
}
