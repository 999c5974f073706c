//! # Metrics
//!
//! Lightweight metrics collector shared across components. Counters and
//! gauges are plain atomics; scraping happens through `snapshot()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Write path
    vectors_inserted: AtomicU64,
    insert_errors: AtomicU64,
    buffers_flushed: AtomicU64,

    // Background loops
    files_merged: AtomicU64,
    merge_errors: AtomicU64,
    indexes_built: AtomicU64,
    index_build_errors: AtomicU64,

    // Query path
    queries_executed: AtomicU64,
    query_vectors: AtomicU64,
    query_errors: AtomicU64,

    // Gauges
    keeping_alive: AtomicU64,
    cache_usage_percent: AtomicU64,
    data_file_size: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                vectors_inserted: AtomicU64::new(0),
                insert_errors: AtomicU64::new(0),
                buffers_flushed: AtomicU64::new(0),
                files_merged: AtomicU64::new(0),
                merge_errors: AtomicU64::new(0),
                indexes_built: AtomicU64::new(0),
                index_build_errors: AtomicU64::new(0),
                queries_executed: AtomicU64::new(0),
                query_vectors: AtomicU64::new(0),
                query_errors: AtomicU64::new(0),
                keeping_alive: AtomicU64::new(0),
                cache_usage_percent: AtomicU64::new(0),
                data_file_size: AtomicU64::new(0),
            }),
        }
    }

    pub fn record_insert(&self, count: u64) {
        self.inner.vectors_inserted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_insert_error(&self) {
        self.inner.insert_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.inner.buffers_flushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_merge(&self, consumed: u64) {
        self.inner.files_merged.fetch_add(consumed, Ordering::Relaxed);
    }

    pub fn record_merge_error(&self) {
        self.inner.merge_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_index_built(&self) {
        self.inner.indexes_built.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_index_build_error(&self) {
        self.inner.index_build_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_query(&self, nq: u64) {
        self.inner.queries_executed.fetch_add(1, Ordering::Relaxed);
        self.inner.query_vectors.fetch_add(nq, Ordering::Relaxed);
    }

    pub fn record_query_error(&self) {
        self.inner.query_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn keep_alive(&self) {
        self.inner.keeping_alive.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_cache_usage_percent(&self, percent: u64) {
        self.inner.cache_usage_percent.store(percent, Ordering::Relaxed);
    }

    pub fn set_data_file_size(&self, bytes: u64) {
        self.inner.data_file_size.store(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            vectors_inserted: self.inner.vectors_inserted.load(Ordering::Relaxed),
            insert_errors: self.inner.insert_errors.load(Ordering::Relaxed),
            buffers_flushed: self.inner.buffers_flushed.load(Ordering::Relaxed),
            files_merged: self.inner.files_merged.load(Ordering::Relaxed),
            merge_errors: self.inner.merge_errors.load(Ordering::Relaxed),
            indexes_built: self.inner.indexes_built.load(Ordering::Relaxed),
            index_build_errors: self.inner.index_build_errors.load(Ordering::Relaxed),
            queries_executed: self.inner.queries_executed.load(Ordering::Relaxed),
            query_vectors: self.inner.query_vectors.load(Ordering::Relaxed),
            query_errors: self.inner.query_errors.load(Ordering::Relaxed),
            keeping_alive: self.inner.keeping_alive.load(Ordering::Relaxed),
            cache_usage_percent: self.inner.cache_usage_percent.load(Ordering::Relaxed),
            data_file_size: self.inner.data_file_size.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics snapshot
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub vectors_inserted: u64,
    pub insert_errors: u64,
    pub buffers_flushed: u64,
    pub files_merged: u64,
    pub merge_errors: u64,
    pub indexes_built: u64,
    pub index_build_errors: u64,
    pub queries_executed: u64,
    pub query_vectors: u64,
    pub query_errors: u64,
    pub keeping_alive: u64,
    pub cache_usage_percent: u64,
    pub data_file_size: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { start: Instant::now(), name: name.into() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timer and log duration
    pub fn stop(self) {
        let duration = self.elapsed();
        tracing::debug!(
            name = %self.name,
            duration_ms = duration.as_millis() as u64,
            "operation completed"
        );
    }
}
