use super::index::RenditionIndex;
use super::stats::StoreStatsTracker;
use super::{RenditionStore, StoreError, StoreStats};
use crate::rendition::{Rendition, RenditionKey};

/// Rendition store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryRenditionStore {
    index: RenditionIndex,
    stats: StoreStatsTracker,
}

impl MemoryRenditionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenditionStore for MemoryRenditionStore {
    fn get(&self, key: &RenditionKey) -> Result<Option<Rendition>, StoreError> {
        let found = self.index.get(key);
        self.stats.record_lookup(found.is_some());
        Ok(found)
    }

    fn get_or_create(&self, rendition: Rendition) -> Result<(Rendition, bool), StoreError> {
        let (stored, created) = self.index.get_or_insert(rendition);
        if created {
            self.stats.increment_created();
        }
        Ok((stored, created))
    }

    fn list_for_image(&self, image_id: u64) -> Result<Vec<Rendition>, StoreError> {
        Ok(self.index.for_image(image_id))
    }

    fn delete_for_image(&self, image_id: u64) -> Result<Vec<Rendition>, StoreError> {
        Ok(self.index.remove_for_image(image_id))
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn stats(&self) -> StoreStats {
        self.stats.snapshot(self.index.len())
    }
}
