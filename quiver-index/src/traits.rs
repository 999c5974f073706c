//! Common interface for all execution engines.
//!
//! An execution engine wraps exactly one on-disk artifact (a raw segment
//! or a built index) and knows how to accumulate, persist, load, cache and
//! search it. Engines are handed out by the [`EngineFactory`] and shared
//! with blocking worker tasks, hence `Arc`.
//!
//! [`EngineFactory`]: crate::engine::EngineFactory

use std::sync::Arc;

use quiver_core::error::Result;
use quiver_core::types::TableIndex;

/// Search result with ID and distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub id: u64,
    pub distance: f32,
}

impl Eq for SearchHit {}

impl PartialOrd for SearchHit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchHit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Smaller distance = smaller in ordering. BinaryHeap is a max-heap,
        // so the worst hit sits on top and is popped when over capacity.
        self.distance.partial_cmp(&other.distance).unwrap_or(std::cmp::Ordering::Equal)
    }
}

/// One artifact's worth of engine behaviour
pub trait ExecutionEngine: Send + Sync {
    fn dimension(&self) -> usize;

    /// Number of vectors in the artifact
    fn count(&self) -> u64;

    /// Logical in-memory size in bytes
    fn size(&self) -> u64;

    /// On-disk size in bytes; 0 before the artifact is serialized
    fn physical_size(&self) -> u64;

    /// Append vectors to the accumulation buffer (flush/merge targets)
    fn add_with_ids(&self, ids: &[u64], vectors: &[f32]) -> Result<()>;

    /// Bring the artifact into memory, via the cache. `index_only` is
    /// accepted for contract compatibility; segment artifacts have no
    /// separable raw part to skip.
    fn load(&self, index_only: bool) -> Result<()>;

    /// Append the raw segment at `location` into the accumulation buffer
    fn merge(&self, location: &str) -> Result<()>;

    /// Persist the accumulated data to this engine's location
    fn serialize(&self) -> Result<()>;

    /// Insert the loaded artifact into the cache
    fn cache(&self) -> Result<()>;

    /// Train `index` over this engine's raw data, persist it at `location`
    /// and return the new artifact's engine.
    fn build_index(&self, location: &str, index: &TableIndex) -> Result<Arc<dyn ExecutionEngine>>;

    /// Top-k per query vector; `queries` is row-major `nq * dimension`
    fn search(&self, queries: &[f32], k: usize, nprobe: usize) -> Result<Vec<Vec<SearchHit>>>;
}
