//! Routes inserts into per-table buffers and flushes them to `New`
//! segment files on the serialisation tick.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use quiver_core::config::DbOptions;
use quiver_core::error::Result;
use quiver_core::metrics::Metrics;
use quiver_core::types::FileType;
use quiver_core::utils::unix_micros;
use quiver_index::{EngineFactory, ExecutionEngine};

use crate::meta::MetaStore;

use super::buffer::TableBuffer;

/// Monotonically increasing vector ids, seeded from the wall clock so ids
/// stay increasing across restarts
struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    fn new() -> Self {
        Self { next: AtomicU64::new(unix_micros() as u64) }
    }

    fn next_batch(&self, n: usize) -> Vec<u64> {
        let start = self.next.fetch_add(n as u64, Ordering::Relaxed);
        (start..start + n as u64).collect()
    }
}

pub struct MemManager {
    meta: Arc<dyn MetaStore>,
    factory: Arc<EngineFactory>,
    options: DbOptions,
    metrics: Metrics,
    buffers: Mutex<HashMap<String, TableBuffer>>,
    id_gen: IdGenerator,
}

impl MemManager {
    pub fn new(
        meta: Arc<dyn MetaStore>,
        factory: Arc<EngineFactory>,
        options: DbOptions,
        metrics: Metrics,
    ) -> Self {
        Self {
            meta,
            factory,
            options,
            metrics,
            buffers: Mutex::new(HashMap::new()),
            id_gen: IdGenerator::new(),
        }
    }

    /// Buffer a batch. Returns the vector ids (caller-supplied or
    /// generated).
    pub async fn insert_vectors(
        &self,
        table_id: &str,
        vectors: &[f32],
        ids: Option<Vec<u64>>,
    ) -> Result<Vec<u64>> {
        // Schema lookup outside the buffer lock; the first insert for a
        // table pins its schema into the buffer.
        let schema = {
            let buffers = self.buffers.lock();
            buffers.get(table_id).map(|b| b.schema().clone())
        };
        let schema = match schema {
            Some(schema) => schema,
            None => self.meta.describe_table(table_id).await?,
        };

        let dimension = schema.dimension as usize;
        if vectors.is_empty() {
            return Err(quiver_core::Error::invalid_argument("no vectors to insert"));
        }
        if vectors.len() % dimension != 0 {
            return Err(quiver_core::Error::invalid_argument(format!(
                "vector data of {} floats does not match dimension {}",
                vectors.len(),
                dimension
            )));
        }
        let n = vectors.len() / dimension;
        let ids = match ids {
            Some(ids) => {
                if ids.len() != n {
                    return Err(quiver_core::Error::invalid_argument(format!(
                        "{} ids supplied for {} vectors",
                        ids.len(),
                        n
                    )));
                }
                ids
            }
            None => self.id_gen.next_batch(n),
        };

        let mut buffers = self.buffers.lock();
        buffers
            .entry(table_id.to_string())
            .or_insert_with(|| TableBuffer::new(schema))
            .push(&ids, vectors)?;
        Ok(ids)
    }

    /// Drop a table's buffer (table drop disallows further lookups)
    pub fn erase(&self, table_id: &str) {
        self.buffers.lock().remove(table_id);
    }

    /// Total buffered bytes across tables
    pub fn mem_size(&self) -> u64 {
        self.buffers.lock().values().map(|b| b.mem_size()).sum()
    }

    /// Flush every non-empty buffer to a segment file. Returns the ids of
    /// tables that were flushed; per-table failures are logged and skipped
    /// so one bad table cannot block the rest.
    pub async fn serialize(&self) -> Result<HashSet<String>> {
        let drained: Vec<(String, TableBuffer)> = {
            let mut buffers = self.buffers.lock();
            std::mem::take(&mut *buffers).into_iter().collect()
        };

        let mut flushed = HashSet::new();
        for (table_id, buffer) in drained {
            if buffer.is_empty() {
                continue;
            }
            match self.flush_buffer(&table_id, &buffer).await {
                Ok(()) => {
                    flushed.insert(table_id);
                }
                Err(e) => {
                    error!(%table_id, error = %e, "failed to flush insert buffer");
                }
            }
        }
        Ok(flushed)
    }

    async fn flush_buffer(&self, table_id: &str, buffer: &TableBuffer) -> Result<()> {
        let mut file = self
            .meta
            .create_table_file(table_id, None, FileType::New)
            .await?;

        let engine = self.factory.build(
            file.dimension,
            &file.location,
            file.engine_type,
            file.metric_type,
            file.nlist,
        )?;
        engine.add_with_ids(buffer.ids(), buffer.vectors())?;

        let write_engine = engine.clone();
        let write = tokio::task::spawn_blocking(move || write_engine.serialize())
            .await
            .map_err(|e| quiver_core::Error::engine(format!("flush task failed: {e}")))?;
        if let Err(e) = write {
            // Typical cause: out of disk space. Drop the half-written file.
            file.file_type = FileType::ToDelete;
            self.meta.update_table_file(&file).await?;
            return Err(e);
        }

        file.file_size = engine.physical_size();
        file.row_count = engine.count();
        file.file_type = if file.engine_type.is_idmap() || file.file_size < file.index_file_size {
            FileType::Raw
        } else {
            FileType::ToIndex
        };
        self.meta.update_table_file(&file).await?;

        if self.options.insert_cache_immediately {
            engine.cache()?;
        }

        self.metrics.record_flush();
        debug!(
            table_id,
            file_id = file.file_id,
            rows = file.row_count,
            bytes = file.file_size,
            state = %file.file_type,
            "insert buffer flushed"
        );
        Ok(())
    }
}
