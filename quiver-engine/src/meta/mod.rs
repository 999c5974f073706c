//! # Metadata Store
//!
//! The catalog interface the coordinator programs against: table schemas,
//! per-file records and their atomic state transitions. File locations are
//! opaque strings fully owned by this layer; nothing above it parses paths.

mod store;

pub use store::LocalMeta;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use quiver_core::error::Result;
use quiver_core::types::{DatePartitionedFiles, FileType, TableFile, TableIndex, TableSchema};

#[async_trait]
pub trait MetaStore: Send + Sync {
    // ------------------------------------------------------------------
    // tables
    // ------------------------------------------------------------------

    async fn create_table(&self, schema: TableSchema) -> Result<()>;

    async fn describe_table(&self, table_id: &str) -> Result<TableSchema>;

    async fn has_table(&self, table_id: &str) -> Result<bool>;

    async fn all_tables(&self) -> Result<Vec<TableSchema>>;

    /// Soft-delete: the table disappears from lookups, its files are
    /// reclaimed later
    async fn delete_table(&self, table_id: &str) -> Result<()>;

    /// Flip every file of a (soft-deleted) table to `ToDelete`
    async fn delete_table_files(&self, table_id: &str) -> Result<()>;

    /// Wipe the whole catalog, physical files included
    async fn drop_all(&self) -> Result<()>;

    async fn update_table_flag(&self, table_id: &str, flag: i64) -> Result<()>;

    // ------------------------------------------------------------------
    // index descriptors
    // ------------------------------------------------------------------

    /// Persist new index params on the table and rewrite them onto its
    /// live (convertible) files
    async fn update_table_index(&self, table_id: &str, index: &TableIndex) -> Result<()>;

    async fn describe_table_index(&self, table_id: &str) -> Result<TableIndex>;

    /// Mark `Index` files `ToDelete`, restore `Backup` and `ToIndex` files
    /// to `Raw`, reset the table's index params to defaults
    async fn drop_table_index(&self, table_id: &str) -> Result<()>;

    // ------------------------------------------------------------------
    // files
    // ------------------------------------------------------------------

    /// Allocate a file id and location, inheriting the table's schema.
    /// `date` defaults to the current UTC day.
    async fn create_table_file(
        &self,
        table_id: &str,
        date: Option<NaiveDate>,
        file_type: FileType,
    ) -> Result<TableFile>;

    /// Single-file transition
    async fn update_table_file(&self, file: &TableFile) -> Result<()>;

    /// Atomic batch transition: either every record lands or none
    async fn update_table_files(&self, files: &[TableFile]) -> Result<()>;

    /// Enqueue all `Raw` files of the table for the index builder
    async fn update_table_files_to_index(&self, table_id: &str) -> Result<()>;

    /// Searchable files, optionally filtered by id set and date set,
    /// grouped by date partition
    async fn files_to_search(
        &self,
        table_id: &str,
        ids: &[u64],
        dates: &[NaiveDate],
    ) -> Result<DatePartitionedFiles>;

    /// Merge candidates: `Raw` files still below the index threshold,
    /// grouped by date, biggest first within each group
    async fn files_to_merge(&self, table_id: &str) -> Result<DatePartitionedFiles>;

    /// All `ToIndex` files across every table
    async fn files_to_index(&self) -> Result<Vec<TableFile>>;

    /// Ids of the table's files currently in one of `types`
    async fn files_by_type(&self, table_id: &str, types: &[FileType]) -> Result<Vec<u64>>;

    /// Every file record of the table, whatever its state
    async fn table_files(&self, table_id: &str) -> Result<Vec<TableFile>>;

    /// Sum of `row_count` over the table's searchable files
    async fn count(&self, table_id: &str) -> Result<u64>;

    /// Total on-disk bytes of live files
    async fn size(&self) -> Result<u64>;

    async fn drop_partitions_by_dates(&self, table_id: &str, dates: &[NaiveDate]) -> Result<()>;

    /// Long-horizon housekeeping driven by the archive criteria
    async fn archive(&self) -> Result<()>;

    /// Physically remove `ToDelete` files whose last transition is older
    /// than `ttl`, then purge empty soft-deleted tables
    async fn cleanup_files_with_ttl(&self, ttl: Duration) -> Result<()>;

    /// Stop-time finalisation: remove leftover in-progress files
    async fn cleanup(&self) -> Result<()>;
}
