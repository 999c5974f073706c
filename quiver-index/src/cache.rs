//! Byte-budget LRU cache over loaded segments, keyed by artifact location.
//!
//! The cache is the process-wide memory budget for search: `PreloadTable`
//! gates admission against `capacity() - usage()`, and eviction keeps
//! `usage() <= capacity()` at all times.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::segment::SegmentData;

pub struct IndexCache {
    capacity: u64,
    inner: Mutex<LruCache<String, Arc<SegmentData>>>,
    usage: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub usage: u64,
    pub capacity: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl IndexCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            inner: Mutex::new(LruCache::unbounded()),
            usage: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn usage(&self) -> u64 {
        self.usage.load(Ordering::Relaxed)
    }

    pub fn get(&self, location: &str) -> Option<Arc<SegmentData>> {
        let mut lru = self.inner.lock();
        match lru.get(location) {
            Some(data) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(data.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert an artifact, evicting least-recently-used entries until the
    /// budget holds. Artifacts larger than the whole budget are refused.
    pub fn insert(&self, location: &str, data: Arc<SegmentData>) {
        let size = data.mem_size();
        if size > self.capacity {
            warn!(location, size, capacity = self.capacity, "artifact exceeds cache budget, not cached");
            return;
        }

        let mut lru = self.inner.lock();
        if let Some(old) = lru.pop(location) {
            self.usage.fetch_sub(old.mem_size(), Ordering::Relaxed);
        }
        lru.push(location.to_string(), data);
        self.usage.fetch_add(size, Ordering::Relaxed);

        while self.usage.load(Ordering::Relaxed) > self.capacity {
            match lru.pop_lru() {
                Some((_, evicted)) => {
                    self.usage.fetch_sub(evicted.mem_size(), Ordering::Relaxed);
                }
                None => break,
            }
        }
    }

    /// Drop one artifact (used when its file is deleted)
    pub fn erase(&self, location: &str) {
        let mut lru = self.inner.lock();
        if let Some(old) = lru.pop(location) {
            self.usage.fetch_sub(old.mem_size(), Ordering::Relaxed);
        }
    }

    pub fn clear(&self) {
        let mut lru = self.inner.lock();
        lru.clear();
        self.usage.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.inner.lock().len();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            entries,
            usage: self.usage(),
            capacity: self.capacity,
            hits,
            misses,
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
        }
    }

    /// Log a one-line usage summary (emitted around query dispatch)
    pub fn log_info(&self) {
        let stats = self.stats();
        info!(
            entries = stats.entries,
            usage = stats.usage,
            capacity = stats.capacity,
            hit_rate = format!("{:.2}", stats.hit_rate),
            "index cache status"
        );
    }
}
