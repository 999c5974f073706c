//! # Public Database Contract
//!
//! The interface an RPC façade (or embedding application) programs
//! against. Implemented by `quiver-engine`.
//!
//! Every operation fails with [`Error::ShuttingDown`] once the engine has
//! been stopped.
//!
//! [`Error::ShuttingDown`]: crate::error::Error::ShuttingDown

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::types::{QueryResult, TableIndex, TableSchema};

#[async_trait]
pub trait VectorDatabase: Send + Sync {
    /// Start background activity. Idempotent.
    async fn start(&self) -> Result<()>;

    /// Flush in-flight inserts, drain background workers and stop.
    /// Idempotent; must be called before the database is dropped.
    async fn stop(&self) -> Result<()>;

    /// Wipe the entire catalog
    async fn drop_all(&self) -> Result<()>;

    /// Persist a new table. `schema.index_file_size` is taken in megabytes
    /// and stored in bytes.
    async fn create_table(&self, schema: TableSchema) -> Result<()>;

    /// Fetch a table's schema; `index_file_size` is returned in megabytes.
    async fn describe_table(&self, table_id: &str) -> Result<TableSchema>;

    async fn has_table(&self, table_id: &str) -> Result<bool>;

    async fn all_tables(&self) -> Result<Vec<TableSchema>>;

    /// With an empty date set: erase the table's memory buffer, soft-delete
    /// the table and wait for the scheduler to release its artifacts.
    /// Otherwise drop only the named date partitions.
    async fn delete_table(&self, table_id: &str, dates: &[NaiveDate]) -> Result<()>;

    /// Update the opaque user flag
    async fn update_table_flag(&self, table_id: &str, flag: i64) -> Result<()>;

    /// Sum of `row_count` across the table's live files
    async fn table_row_count(&self, table_id: &str) -> Result<u64>;

    /// Buffer `vectors` (row-major, `n * dimension` floats) for the table.
    /// Returns the vector ids: the caller-supplied ones, or generated
    /// monotonically increasing ids.
    async fn insert_vectors(
        &self,
        table_id: &str,
        vectors: &[f32],
        ids: Option<Vec<u64>>,
    ) -> Result<Vec<u64>>;

    /// Bring the table to a state where all convertible files are `Index`
    /// (or `Raw` for IDMAP). Level-triggered and idempotent: the call keeps
    /// polling until the watched state set is empty.
    async fn create_index(&self, table_id: &str, index: TableIndex) -> Result<()>;

    async fn describe_index(&self, table_id: &str) -> Result<TableIndex>;

    async fn drop_index(&self, table_id: &str) -> Result<()>;

    /// Load today's searchable artifacts into the cache, failing with
    /// `CacheFull` before the budget would be exceeded.
    async fn preload_table(&self, table_id: &str) -> Result<()>;

    /// Top-k search over today's partition
    async fn query(
        &self,
        table_id: &str,
        topk: usize,
        nq: usize,
        nprobe: usize,
        vectors: &[f32],
    ) -> Result<QueryResult>;

    /// Top-k search over a set of date partitions
    async fn query_by_dates(
        &self,
        table_id: &str,
        topk: usize,
        nq: usize,
        nprobe: usize,
        vectors: &[f32],
        dates: &[NaiveDate],
    ) -> Result<QueryResult>;

    /// Top-k search over explicitly named files (decimal file ids)
    #[allow(clippy::too_many_arguments)]
    async fn query_by_file_ids(
        &self,
        table_id: &str,
        file_ids: &[String],
        topk: usize,
        nq: usize,
        nprobe: usize,
        vectors: &[f32],
        dates: &[NaiveDate],
    ) -> Result<QueryResult>;

    /// Total on-disk size in bytes
    async fn size(&self) -> Result<u64>;
}
