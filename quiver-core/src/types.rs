//! # Core Types
//!
//! The catalog-level data structures shared by every component: table
//! schemas, index descriptors and the per-file records whose `file_type`
//! field drives the compaction state machine.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Hard cap on vector dimensionality
pub const MAX_DIMENSION: u16 = 16384;

/// Default number of IVF coarse cells
pub const DEFAULT_NLIST: u32 = 16384;

/// Distance measure, fixed at table creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    L2,
    InnerProduct,
}

impl Default for MetricType {
    fn default() -> Self {
        MetricType::L2
    }
}

/// Indexing algorithm family.
///
/// `Idmap` is the degenerate family: segments hold raw vectors forever and
/// are never promoted past `Raw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineType {
    Idmap,
    IvfFlat,
    IvfSq8,
}

impl EngineType {
    pub fn is_idmap(self) -> bool {
        matches!(self, EngineType::Idmap)
    }
}

impl Default for EngineType {
    fn default() -> Self {
        EngineType::Idmap
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineType::Idmap => "IDMAP",
            EngineType::IvfFlat => "IVFFLAT",
            EngineType::IvfSq8 => "IVFSQ8",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of a table file.
///
/// Valid transitions:
///
/// ```text
///   New ──serialize──► Raw | ToIndex
///   Raw ──merge──► (consumed, ToDelete)   NewMerge ─► Raw | ToIndex
///   ToIndex ──build──► Backup             NewIndex ─► Index
///   any ──drop/ttl──► ToDelete ──sweep──► removed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    New,
    NewMerge,
    NewIndex,
    Raw,
    ToIndex,
    Index,
    Backup,
    ToDelete,
}

impl FileType {
    /// States that hold searchable data
    pub const SEARCHABLE: [FileType; 3] = [FileType::Raw, FileType::ToIndex, FileType::Index];

    /// In-progress states owned by exactly one background worker
    pub fn is_pending(self) -> bool {
        matches!(self, FileType::New | FileType::NewMerge | FileType::NewIndex)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::New => "NEW",
            FileType::NewMerge => "NEW_MERGE",
            FileType::NewIndex => "NEW_INDEX",
            FileType::Raw => "RAW",
            FileType::ToIndex => "TO_INDEX",
            FileType::Index => "INDEX",
            FileType::Backup => "BACKUP",
            FileType::ToDelete => "TO_DELETE",
        };
        f.write_str(name)
    }
}

/// Table schema as stored in the meta catalog.
///
/// `index_file_size` is kept in bytes internally; the public API converts
/// from/to megabytes at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_id: String,
    pub dimension: u16,
    pub index_file_size: u64,
    pub engine_type: EngineType,
    pub metric_type: MetricType,
    pub nlist: u32,
    pub flag: i64,
    pub created_on: i64,
}

impl TableSchema {
    pub fn new(table_id: impl Into<String>, dimension: u16) -> Self {
        Self {
            table_id: table_id.into(),
            dimension,
            index_file_size: 0,
            engine_type: EngineType::default(),
            metric_type: MetricType::default(),
            nlist: DEFAULT_NLIST,
            flag: 0,
            created_on: 0,
        }
    }

    /// Validate the schema before it reaches the catalog
    pub fn validate(&self) -> Result<()> {
        if self.table_id.is_empty() {
            return Err(Error::invalid_argument("table id must not be empty"));
        }
        if self.dimension == 0 || self.dimension > MAX_DIMENSION {
            return Err(Error::invalid_argument(format!(
                "dimension must be in 1..={}, got {}",
                MAX_DIMENSION, self.dimension
            )));
        }
        if self.index_file_size == 0 {
            return Err(Error::invalid_argument("index file size must be positive"));
        }
        if self.nlist == 0 {
            return Err(Error::invalid_argument("nlist must be positive"));
        }
        Ok(())
    }
}

/// Per-table index descriptor.
///
/// `metric_type` is immutable after table creation; `CreateIndex` copies the
/// existing metric onto any requested index before comparing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableIndex {
    pub engine_type: EngineType,
    pub nlist: u32,
    pub metric_type: MetricType,
}

impl Default for TableIndex {
    fn default() -> Self {
        Self {
            engine_type: EngineType::default(),
            nlist: DEFAULT_NLIST,
            metric_type: MetricType::default(),
        }
    }
}

/// One immutable on-disk artifact holding a subset of a table's vectors
/// for a single date partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFile {
    pub file_id: u64,
    pub table_id: String,
    pub date: NaiveDate,
    pub file_type: FileType,
    pub file_size: u64,
    pub row_count: u64,
    /// Opaque path owned by the meta layer
    pub location: String,
    pub dimension: u16,
    pub engine_type: EngineType,
    pub metric_type: MetricType,
    pub nlist: u32,
    pub index_file_size: u64,
    pub created_on: i64,
    /// Last state-transition time (unix millis); drives the TTL sweep
    pub updated_at: i64,
}

/// Files grouped by date partition, in partition order
pub type DatePartitionedFiles = BTreeMap<NaiveDate, Vec<TableFile>>;

/// Flattened top-k answer for a batch of query vectors.
///
/// Both arrays are `nq * topk` long; queries matching fewer than `topk`
/// vectors are padded with `u64::MAX` ids and `f32::MAX` distances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub ids: Vec<u64>,
    pub distances: Vec<f32>,
}

impl QueryResult {
    pub fn with_capacity(nq: usize, topk: usize) -> Self {
        Self {
            ids: Vec::with_capacity(nq * topk),
            distances: Vec::with_capacity(nq * topk),
        }
    }
}
