//! # Quiver Index
//!
//! Execution engines for the Quiver vector database: raw segments with
//! brute-force search, IVF-flat and IVF-SQ8 index artifacts, and the
//! byte-budget cache that holds loaded artifacts.
//!
//! ```text
//!  flush/merge target          existing artifact
//!  ┌──────────────┐            ┌──────────────┐
//!  │ add_with_ids │            │  load()      │──► IndexCache
//!  │ merge()      │            │  search()    │
//!  │ serialize()  │            │  cache()     │
//!  └──────┬───────┘            └──────▲───────┘
//!         │  build_index()            │
//!         └────────► IVF segment ─────┘
//! ```

pub mod cache;
pub mod distance;
pub mod engine;
pub mod flat;
pub mod ivf;
pub mod segment;
pub mod traits;

pub use cache::{CacheStats, IndexCache};
pub use engine::{EngineFactory, SegmentEngine};
pub use flat::RawSegment;
pub use ivf::IvfSegment;
pub use segment::{read_segment, SegmentData};
pub use traits::{ExecutionEngine, SearchHit};
