use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lookup counters for a rendition store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    /// Rows inserted by `get_or_create`
    pub created: u64,
    pub entries: u64,
}

impl StoreStats {
    /// Fraction of lookups that were hits, 0.0 when nothing was looked up
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StoreStatsTracker {
    hits: AtomicU64,
    misses: AtomicU64,
    created: AtomicU64,
}

impl StoreStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a lookup
    pub fn record_lookup(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entries: usize) -> StoreStats {
        StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            entries: entries as u64,
        }
    }
}
