//! In-process metadata store.
//!
//! Keeps the catalog under one lock so every transition, single or batch,
//! is atomic to observers. Owns the physical segment files below the data
//! root: records are `<root>/<table_id>/<file_id>.seg`, and only the TTL
//! sweep, `CleanUp` and `DropAll` ever unlink anything.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use quiver_core::config::ArchiveOptions;
use quiver_core::error::{Error, Result};
use quiver_core::types::{
    DatePartitionedFiles, FileType, TableFile, TableIndex, TableSchema, DEFAULT_NLIST,
};
use quiver_core::utils::{today, unix_millis};
use quiver_core::EngineType;

use super::MetaStore;

struct TableRecord {
    schema: TableSchema,
    deleted: bool,
}

#[derive(Default)]
struct MetaState {
    tables: HashMap<String, TableRecord>,
    files: BTreeMap<u64, TableFile>,
    next_file_id: u64,
}

pub struct LocalMeta {
    root: PathBuf,
    archive: ArchiveOptions,
    state: Mutex<MetaState>,
}

impl LocalMeta {
    pub async fn new(root: impl Into<PathBuf>, archive: ArchiveOptions) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root, archive, state: Mutex::new(MetaState::default()) })
    }

    fn live_schema<'a>(state: &'a MetaState, table_id: &str) -> Result<&'a TableSchema> {
        match state.tables.get(table_id) {
            Some(record) if !record.deleted => Ok(&record.schema),
            _ => Err(Error::table_not_found(table_id)),
        }
    }

    fn live_schema_mut<'a>(state: &'a mut MetaState, table_id: &str) -> Result<&'a mut TableSchema> {
        match state.tables.get_mut(table_id) {
            Some(record) if !record.deleted => Ok(&mut record.schema),
            _ => Err(Error::table_not_found(table_id)),
        }
    }

    async fn unlink(&self, locations: Vec<String>) {
        for location in locations {
            match tokio::fs::remove_file(&location).await {
                Ok(()) => debug!(location, "segment file removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(location, error = %e, "failed to remove segment file"),
            }
        }
    }
}

#[async_trait]
impl MetaStore for LocalMeta {
    async fn create_table(&self, mut schema: TableSchema) -> Result<()> {
        let mut state = self.state.lock();
        if state.tables.contains_key(&schema.table_id) {
            return Err(Error::table_already_exists(schema.table_id));
        }
        if schema.created_on == 0 {
            schema.created_on = unix_millis();
        }
        info!(table_id = %schema.table_id, dimension = schema.dimension, "table created");
        state
            .tables
            .insert(schema.table_id.clone(), TableRecord { schema, deleted: false });
        Ok(())
    }

    async fn describe_table(&self, table_id: &str) -> Result<TableSchema> {
        let state = self.state.lock();
        Self::live_schema(&state, table_id).cloned()
    }

    async fn has_table(&self, table_id: &str) -> Result<bool> {
        let state = self.state.lock();
        Ok(matches!(state.tables.get(table_id), Some(record) if !record.deleted))
    }

    async fn all_tables(&self) -> Result<Vec<TableSchema>> {
        let state = self.state.lock();
        Ok(state
            .tables
            .values()
            .filter(|record| !record.deleted)
            .map(|record| record.schema.clone())
            .collect())
    }

    async fn delete_table(&self, table_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        match state.tables.get_mut(table_id) {
            Some(record) if !record.deleted => {
                record.deleted = true;
                info!(table_id, "table soft-deleted");
                Ok(())
            }
            _ => Err(Error::table_not_found(table_id)),
        }
    }

    async fn delete_table_files(&self, table_id: &str) -> Result<()> {
        let now = unix_millis();
        let mut state = self.state.lock();
        for file in state.files.values_mut() {
            if file.table_id == table_id && file.file_type != FileType::ToDelete {
                file.file_type = FileType::ToDelete;
                file.updated_at = now;
            }
        }
        Ok(())
    }

    async fn drop_all(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            *state = MetaState::default();
        }
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.root).await?;
        info!("catalog dropped");
        Ok(())
    }

    async fn update_table_flag(&self, table_id: &str, flag: i64) -> Result<()> {
        let mut state = self.state.lock();
        Self::live_schema_mut(&mut state, table_id)?.flag = flag;
        Ok(())
    }

    async fn update_table_index(&self, table_id: &str, index: &TableIndex) -> Result<()> {
        let now = unix_millis();
        let mut state = self.state.lock();
        {
            let schema = Self::live_schema_mut(&mut state, table_id)?;
            schema.engine_type = index.engine_type;
            schema.nlist = index.nlist;
        }
        // Convertible files must follow the table so a rebuild never mixes
        // engine families.
        for file in state.files.values_mut() {
            if file.table_id == table_id
                && !matches!(file.file_type, FileType::ToDelete | FileType::Index | FileType::Backup)
            {
                file.engine_type = index.engine_type;
                file.nlist = index.nlist;
                file.updated_at = now;
            }
        }
        Ok(())
    }

    async fn describe_table_index(&self, table_id: &str) -> Result<TableIndex> {
        let state = self.state.lock();
        let schema = Self::live_schema(&state, table_id)?;
        Ok(TableIndex {
            engine_type: schema.engine_type,
            nlist: schema.nlist,
            metric_type: schema.metric_type,
        })
    }

    async fn drop_table_index(&self, table_id: &str) -> Result<()> {
        let now = unix_millis();
        let mut state = self.state.lock();
        {
            let schema = Self::live_schema_mut(&mut state, table_id)?;
            schema.engine_type = EngineType::Idmap;
            schema.nlist = DEFAULT_NLIST;
        }
        for file in state.files.values_mut() {
            if file.table_id != table_id {
                continue;
            }
            match file.file_type {
                FileType::Index => {
                    file.file_type = FileType::ToDelete;
                    file.updated_at = now;
                }
                // Raw data survives the index drop
                FileType::Backup | FileType::ToIndex => {
                    file.file_type = FileType::Raw;
                    file.updated_at = now;
                }
                _ => {}
            }
        }
        debug!(table_id, "table index dropped");
        Ok(())
    }

    async fn create_table_file(
        &self,
        table_id: &str,
        date: Option<NaiveDate>,
        file_type: FileType,
    ) -> Result<TableFile> {
        let (schema, file_id) = {
            let mut state = self.state.lock();
            let schema = Self::live_schema(&state, table_id)?.clone();
            state.next_file_id += 1;
            (schema, state.next_file_id)
        };

        let dir = self.root.join(table_id);
        tokio::fs::create_dir_all(&dir).await?;
        let location = dir.join(format!("{file_id}.seg")).to_string_lossy().into_owned();

        let now = unix_millis();
        let file = TableFile {
            file_id,
            table_id: table_id.to_string(),
            date: date.unwrap_or_else(today),
            file_type,
            file_size: 0,
            row_count: 0,
            location,
            dimension: schema.dimension,
            engine_type: schema.engine_type,
            metric_type: schema.metric_type,
            nlist: schema.nlist,
            index_file_size: schema.index_file_size,
            created_on: now,
            updated_at: now,
        };

        let mut state = self.state.lock();
        state.files.insert(file_id, file.clone());
        Ok(file)
    }

    async fn update_table_file(&self, file: &TableFile) -> Result<()> {
        self.update_table_files(std::slice::from_ref(file)).await
    }

    async fn update_table_files(&self, files: &[TableFile]) -> Result<()> {
        let now = unix_millis();
        let mut state = self.state.lock();
        for file in files {
            let mut record = file.clone();
            record.updated_at = now;
            // A flush racing a table drop must not resurrect the file
            let table_deleted =
                matches!(state.tables.get(&record.table_id), Some(t) if t.deleted) ||
                !state.tables.contains_key(&record.table_id);
            if table_deleted {
                record.file_type = FileType::ToDelete;
            }
            state.files.insert(record.file_id, record);
        }
        Ok(())
    }

    async fn update_table_files_to_index(&self, table_id: &str) -> Result<()> {
        let now = unix_millis();
        let mut state = self.state.lock();
        Self::live_schema(&state, table_id)?;
        for file in state.files.values_mut() {
            if file.table_id == table_id && file.file_type == FileType::Raw {
                file.file_type = FileType::ToIndex;
                file.updated_at = now;
            }
        }
        Ok(())
    }

    async fn files_to_search(
        &self,
        table_id: &str,
        ids: &[u64],
        dates: &[NaiveDate],
    ) -> Result<DatePartitionedFiles> {
        let state = self.state.lock();
        Self::live_schema(&state, table_id)?;

        let mut partitions = DatePartitionedFiles::new();
        for file in state.files.values() {
            if file.table_id != table_id || !FileType::SEARCHABLE.contains(&file.file_type) {
                continue;
            }
            if !dates.is_empty() && !dates.contains(&file.date) {
                continue;
            }
            if !ids.is_empty() && !ids.contains(&file.file_id) {
                continue;
            }
            partitions.entry(file.date).or_default().push(file.clone());
        }
        Ok(partitions)
    }

    async fn files_to_merge(&self, table_id: &str) -> Result<DatePartitionedFiles> {
        let state = self.state.lock();
        Self::live_schema(&state, table_id)?;

        let mut partitions = DatePartitionedFiles::new();
        for file in state.files.values() {
            if file.table_id == table_id
                && file.file_type == FileType::Raw
                && file.file_size < file.index_file_size
            {
                partitions.entry(file.date).or_default().push(file.clone());
            }
        }
        // Biggest first, so one merge pass reaches the threshold fastest
        for group in partitions.values_mut() {
            group.sort_by(|a, b| b.file_size.cmp(&a.file_size));
        }
        Ok(partitions)
    }

    async fn files_to_index(&self) -> Result<Vec<TableFile>> {
        let state = self.state.lock();
        Ok(state
            .files
            .values()
            .filter(|file| file.file_type == FileType::ToIndex)
            .cloned()
            .collect())
    }

    async fn files_by_type(&self, table_id: &str, types: &[FileType]) -> Result<Vec<u64>> {
        let state = self.state.lock();
        if !state.tables.contains_key(table_id) {
            return Err(Error::table_not_found(table_id));
        }
        Ok(state
            .files
            .values()
            .filter(|file| file.table_id == table_id && types.contains(&file.file_type))
            .map(|file| file.file_id)
            .collect())
    }

    async fn table_files(&self, table_id: &str) -> Result<Vec<TableFile>> {
        let state = self.state.lock();
        Ok(state
            .files
            .values()
            .filter(|file| file.table_id == table_id)
            .cloned()
            .collect())
    }

    async fn count(&self, table_id: &str) -> Result<u64> {
        let state = self.state.lock();
        Self::live_schema(&state, table_id)?;
        Ok(state
            .files
            .values()
            .filter(|file| {
                file.table_id == table_id && FileType::SEARCHABLE.contains(&file.file_type)
            })
            .map(|file| file.row_count)
            .sum())
    }

    async fn size(&self) -> Result<u64> {
        let state = self.state.lock();
        Ok(state
            .files
            .values()
            .filter(|file| file.file_type != FileType::ToDelete)
            .map(|file| file.file_size)
            .sum())
    }

    async fn drop_partitions_by_dates(&self, table_id: &str, dates: &[NaiveDate]) -> Result<()> {
        let now = unix_millis();
        let mut state = self.state.lock();
        Self::live_schema(&state, table_id)?;
        for file in state.files.values_mut() {
            if file.table_id == table_id
                && file.file_type != FileType::ToDelete
                && dates.contains(&file.date)
            {
                file.file_type = FileType::ToDelete;
                file.updated_at = now;
            }
        }
        debug!(table_id, partitions = dates.len(), "partitions dropped");
        Ok(())
    }

    async fn archive(&self) -> Result<()> {
        let now = unix_millis();
        let mut state = self.state.lock();

        if let Some(days) = self.archive.days {
            let cutoff = today() - chrono::Duration::days(days as i64);
            for file in state.files.values_mut() {
                if file.date < cutoff && FileType::SEARCHABLE.contains(&file.file_type) {
                    file.file_type = FileType::ToDelete;
                    file.updated_at = now;
                }
            }
        }

        if let Some(capacity) = self.archive.disk_capacity {
            let mut total: u64 = state
                .files
                .values()
                .filter(|f| f.file_type != FileType::ToDelete)
                .map(|f| f.file_size)
                .sum();
            if total > capacity {
                let mut candidates: Vec<u64> = state
                    .files
                    .values()
                    .filter(|f| FileType::SEARCHABLE.contains(&f.file_type))
                    .map(|f| f.file_id)
                    .collect();
                candidates.sort_by_key(|id| state.files[id].created_on);
                for id in candidates {
                    if total <= capacity {
                        break;
                    }
                    if let Some(file) = state.files.get_mut(&id) {
                        total -= file.file_size;
                        file.file_type = FileType::ToDelete;
                        file.updated_at = now;
                    }
                }
            }
        }

        Ok(())
    }

    async fn cleanup_files_with_ttl(&self, ttl: Duration) -> Result<()> {
        let now = unix_millis();
        let ttl_ms = ttl.as_millis() as i64;

        let locations = {
            let mut state = self.state.lock();
            let expired: Vec<u64> = state
                .files
                .values()
                .filter(|file| {
                    file.file_type == FileType::ToDelete && file.updated_at + ttl_ms <= now
                })
                .map(|file| file.file_id)
                .collect();

            let locations: Vec<String> = expired
                .iter()
                .filter_map(|id| state.files.remove(id))
                .map(|file| file.location)
                .collect();

            // A soft-deleted table is fully gone once its last file is
            let remaining: std::collections::HashSet<String> =
                state.files.values().map(|f| f.table_id.clone()).collect();
            state
                .tables
                .retain(|id, record| !record.deleted || remaining.contains(id));

            locations
        };

        if !locations.is_empty() {
            debug!(count = locations.len(), "reclaiming expired files");
        }
        self.unlink(locations).await;
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        let locations = {
            let mut state = self.state.lock();
            let leftover: Vec<u64> = state
                .files
                .values()
                .filter(|file| file.file_type.is_pending())
                .map(|file| file.file_id)
                .collect();
            leftover
                .iter()
                .filter_map(|id| state.files.remove(id))
                .map(|file| file.location)
                .collect::<Vec<_>>()
        };

        if !locations.is_empty() {
            info!(count = locations.len(), "removing leftover in-progress files");
        }
        self.unlink(locations).await;
        Ok(())
    }
}

impl LocalMeta {
    /// Data root this catalog writes under
    pub fn root(&self) -> &Path {
        &self.root
    }
}
