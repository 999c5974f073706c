//! # Quiver Core
//!
//! Shared building blocks for the Quiver vector database:
//! - catalog types (tables, files, indexes) and their state machine
//! - the error taxonomy
//! - configuration
//! - the metrics collector
//! - the public `VectorDatabase` contract

pub mod config;
pub mod error;
pub mod metrics;
pub mod traits;
pub mod types;
pub mod utils;

pub use config::{ArchiveOptions, DbOptions, Mode};
pub use error::{Error, Result};
pub use metrics::{Metrics, MetricsSnapshot, Timer};
pub use traits::VectorDatabase;
pub use types::{
    DatePartitionedFiles, EngineType, FileType, MetricType, QueryResult, TableFile, TableIndex,
    TableSchema, DEFAULT_NLIST, MAX_DIMENSION,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
