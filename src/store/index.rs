//! In-memory rendition index

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::rendition::{Rendition, RenditionKey};

/// Snapshot format version written by this build
pub const INDEX_VERSION: u32 = 1;

/// Serializable form of the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub version: u32,
    pub renditions: Vec<Rendition>,
}

/// Thread-safe map from rendition key to rendition
#[derive(Debug, Default)]
pub struct RenditionIndex {
    entries: RwLock<HashMap<RenditionKey, Rendition>>,
}

impl RenditionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &RenditionKey) -> Option<Rendition> {
        self.entries.read().get(key).cloned()
    }

    /// Insert unless present, under a single write lock
    pub fn get_or_insert(&self, rendition: Rendition) -> (Rendition, bool) {
        let mut entries = self.entries.write();
        let key = rendition.key();
        if let Some(existing) = entries.get(&key) {
            return (existing.clone(), false);
        }
        entries.insert(key, rendition.clone());
        (rendition, true)
    }

    pub fn remove(&self, key: &RenditionKey) -> Option<Rendition> {
        self.entries.write().remove(key)
    }

    /// Put back rows taken out by [`remove_for_image`](Self::remove_for_image)
    pub fn restore(&self, renditions: Vec<Rendition>) {
        let mut entries = self.entries.write();
        for rendition in renditions {
            entries.entry(rendition.key()).or_insert(rendition);
        }
    }

    pub fn for_image(&self, image_id: u64) -> Vec<Rendition> {
        let mut renditions: Vec<Rendition> = self
            .entries
            .read()
            .values()
            .filter(|r| r.image_id == image_id)
            .cloned()
            .collect();
        renditions.sort_by(|a, b| {
            a.filter_spec
                .cmp(&b.filter_spec)
                .then_with(|| a.vary_key.cmp(&b.vary_key))
        });
        renditions
    }

    pub fn remove_for_image(&self, image_id: u64) -> Vec<Rendition> {
        let mut entries = self.entries.write();
        let keys: Vec<RenditionKey> = entries
            .keys()
            .filter(|k| k.image_id == image_id)
            .cloned()
            .collect();
        let mut removed: Vec<Rendition> = keys.iter().filter_map(|k| entries.remove(k)).collect();
        removed.sort_by(|a, b| a.filter_spec.cmp(&b.filter_spec));
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        let mut renditions: Vec<Rendition> = self.entries.read().values().cloned().collect();
        renditions.sort_by(|a, b| {
            (a.image_id, &a.filter_spec, &a.vary_key).cmp(&(b.image_id, &b.filter_spec, &b.vary_key))
        });
        IndexSnapshot {
            version: INDEX_VERSION,
            renditions,
        }
    }

    /// Rebuild from a snapshot; later duplicates of a key are dropped
    pub fn from_snapshot(snapshot: IndexSnapshot) -> Self {
        let mut entries = HashMap::with_capacity(snapshot.renditions.len());
        for rendition in snapshot.renditions {
            entries.entry(rendition.key()).or_insert(rendition);
        }
        Self {
            entries: RwLock::new(entries),
        }
    }
}
