//! # Engine Coordinator
//!
//! Owns the per-table data lifecycle from insert to searchable index:
//!
//! ```text
//! Insert ──► MemManager ──serialize──► RAW file ──merge──► RAW / TO_INDEX
//!                                                              │ build
//! Query ──► FilesToSearch ──► SearchJob ──► scheduler          ▼
//!                                                            INDEX
//! ```
//!
//! A single timer task drives the background work: every second it
//! refreshes metrics, runs one compaction step and one index step. At
//! most one compaction and one index build are outstanding at any moment.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use quiver_core::config::{DbOptions, Mode};
use quiver_core::error::{Error, Result};
use quiver_core::metrics::{Metrics, Timer};
use quiver_core::traits::VectorDatabase;
use quiver_core::types::{
    EngineType, FileType, QueryResult, TableFile, TableIndex, TableSchema,
};
use quiver_core::utils::{today, unix_millis, ONE_MB};
use quiver_index::{EngineFactory, ExecutionEngine, IndexCache};

use crate::memory::MemManager;
use crate::meta::{LocalMeta, MetaStore};
use crate::scheduler::{BuildIndexJob, DeleteJob, Job, JobManager, SearchJob};

/// Seconds between background ticks
const TIMER_INTERVAL: Duration = Duration::from_secs(1);
/// Timed wait used to reap a finished background future
const REAP_TIMEOUT: Duration = Duration::from_millis(10);
/// Ceiling of the CreateIndex poll backoff
const CREATE_INDEX_MAX_BACKOFF: Duration = Duration::from_secs(10);

struct DbCore {
    options: DbOptions,
    meta: Arc<dyn MetaStore>,
    mem: Arc<MemManager>,
    factory: Arc<EngineFactory>,
    cache: Arc<IndexCache>,
    jobs: Arc<JobManager>,
    metrics: Metrics,

    shutting_down: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    timer_handle: AsyncMutex<Option<JoinHandle<()>>>,

    /// At most one outstanding compaction / index build
    compact_result: AsyncMutex<Option<JoinHandle<()>>>,
    index_result: AsyncMutex<Option<JoinHandle<()>>>,

    /// Tables flushed since the last compaction was scheduled
    compact_table_ids: Mutex<HashSet<String>>,
    /// Serialises flush-to-disk with the pending-set union
    mem_serialize_lock: AsyncMutex<()>,
    /// Serialises CreateIndex's index change with the background build
    build_index_lock: AsyncMutex<()>,
}

/// Cheap-clone handle over the engine coordinator
#[derive(Clone)]
pub struct Database {
    core: Arc<DbCore>,
}

impl Database {
    /// Build default services rooted at `options.path` and start
    pub async fn open(options: DbOptions) -> Result<Database> {
        let meta: Arc<dyn MetaStore> =
            Arc::new(LocalMeta::new(&options.path, options.archive.clone()).await?);
        Self::with_meta(options, meta).await
    }

    /// Same as [`open`](Self::open) with a caller-supplied meta store
    pub async fn with_meta(options: DbOptions, meta: Arc<dyn MetaStore>) -> Result<Database> {
        let cache = Arc::new(IndexCache::new(options.cache_capacity));
        let factory = Arc::new(EngineFactory::new(cache.clone()));
        let metrics = Metrics::new();
        let mem = Arc::new(MemManager::new(
            meta.clone(),
            factory.clone(),
            options.clone(),
            metrics.clone(),
        ));
        let jobs = Arc::new(JobManager::new(
            meta.clone(),
            factory.clone(),
            metrics.clone(),
            options.insert_cache_immediately,
            options.scheduler_workers,
        ));
        let (shutdown_tx, _) = watch::channel(false);

        let core = Arc::new(DbCore {
            options,
            meta,
            mem,
            factory,
            cache,
            jobs,
            metrics,
            shutting_down: AtomicBool::new(true),
            shutdown_tx,
            timer_handle: AsyncMutex::new(None),
            compact_result: AsyncMutex::new(None),
            index_result: AsyncMutex::new(None),
            compact_table_ids: Mutex::new(HashSet::new()),
            mem_serialize_lock: AsyncMutex::new(()),
            build_index_lock: AsyncMutex::new(()),
        });

        let db = Database { core };
        db.start().await?;
        Ok(db)
    }

    /// The cache holding loaded artifacts (capacity/usage introspection)
    pub fn cache(&self) -> Arc<IndexCache> {
        self.core.cache.clone()
    }

    /// Metrics collector shared by every component
    pub fn metrics(&self) -> Metrics {
        self.core.metrics.clone()
    }

    pub async fn start(&self) -> Result<()> {
        let core = &self.core;
        if !core.shutting_down.load(Ordering::Acquire) {
            return Ok(());
        }
        core.shutting_down.store(false, Ordering::Release);
        let _ = core.shutdown_tx.send(false);

        // Read-only cluster members never mutate files in the background
        if core.options.mode != Mode::ClusterReadonly {
            let loop_core = core.clone();
            let rx = core.shutdown_tx.subscribe();
            *core.timer_handle.lock().await =
                Some(tokio::spawn(async move { loop_core.background_timer_loop(rx).await }));
        }
        info!(mode = ?core.options.mode, "database started");
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let core = &self.core;
        if core.shutting_down.load(Ordering::Acquire) {
            return Ok(());
        }
        core.shutting_down.store(true, Ordering::Release);

        // Nothing buffered may be lost
        core.mem_serialize().await;

        let _ = core.shutdown_tx.send(true);
        if let Some(handle) = core.timer_handle.lock().await.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "background timer task exited abnormally");
            }
        }
        // Read-only members were not started with a timer; drain directly
        core.wait_merge_file_finish().await;
        core.wait_build_index_finish().await;

        if core.options.mode != Mode::ClusterReadonly {
            core.meta.cleanup().await?;
        }
        // The scheduler outlives stop/start cycles; its workers drain once
        // the queue closes on drop
        info!("database stopped");
        Ok(())
    }

    pub async fn drop_all(&self) -> Result<()> {
        self.core.check_running()?;
        self.core.meta.drop_all().await
    }

    pub async fn create_table(&self, mut schema: TableSchema) -> Result<()> {
        self.core.check_running()?;
        // The client hands the threshold over in megabytes
        schema.index_file_size = schema.index_file_size.saturating_mul(ONE_MB);
        schema.created_on = unix_millis();
        schema.validate()?;
        self.core.meta.create_table(schema).await
    }

    pub async fn describe_table(&self, table_id: &str) -> Result<TableSchema> {
        self.core.check_running()?;
        let mut schema = self.core.meta.describe_table(table_id).await?;
        schema.index_file_size /= ONE_MB;
        Ok(schema)
    }

    pub async fn has_table(&self, table_id: &str) -> Result<bool> {
        self.core.check_running()?;
        self.core.meta.has_table(table_id).await
    }

    pub async fn all_tables(&self) -> Result<Vec<TableSchema>> {
        self.core.check_running()?;
        self.core.meta.all_tables().await
    }

    pub async fn delete_table(&self, table_id: &str, dates: &[NaiveDate]) -> Result<()> {
        let core = &self.core;
        core.check_running()?;
        debug!(table_id, partitions = dates.len(), "prepare to delete table");

        if dates.is_empty() {
            core.mem.erase(table_id); // no further inserts may land
            core.meta.delete_table(table_id).await?;

            // The scheduler releases cached artifacts before the files
            // themselves are reclaimed
            let job = DeleteJob::new(table_id);
            core.jobs.put(Job::Delete(job.clone()))?;
            job.wait_and_delete().await
        } else {
            // A buffered insert can only ever flush into today's
            // partition; dropping today must take the buffer with it
            if dates.contains(&today()) {
                core.mem.erase(table_id);
            }
            core.meta.drop_partitions_by_dates(table_id, dates).await
        }
    }

    pub async fn update_table_flag(&self, table_id: &str, flag: i64) -> Result<()> {
        self.core.check_running()?;
        self.core.meta.update_table_flag(table_id, flag).await
    }

    pub async fn table_row_count(&self, table_id: &str) -> Result<u64> {
        self.core.check_running()?;
        self.core.meta.count(table_id).await
    }

    pub async fn insert_vectors(
        &self,
        table_id: &str,
        vectors: &[f32],
        ids: Option<Vec<u64>>,
    ) -> Result<Vec<u64>> {
        let core = &self.core;
        core.check_running()?;

        match core.mem.insert_vectors(table_id, vectors, ids).await {
            Ok(ids) => {
                core.metrics.record_insert(ids.len() as u64);
                Ok(ids)
            }
            Err(e) => {
                core.metrics.record_insert_error();
                Err(e)
            }
        }
    }

    /// Level-triggered: keeps converging until every convertible file of
    /// the table reached its terminal state under the requested params.
    pub async fn create_index(&self, table_id: &str, index: TableIndex) -> Result<()> {
        let core = &self.core;
        core.check_running()?;

        {
            let _guard = core.build_index_lock.lock().await;

            let old_index = core.meta.describe_table_index(table_id).await?;
            let mut new_index = index;
            // Metric is fixed at table creation
            new_index.metric_type = old_index.metric_type;

            if new_index != old_index {
                debug!(table_id, engine = %new_index.engine_type, nlist = new_index.nlist, "replacing table index");
                core.meta.drop_table_index(table_id).await?;
                core.meta.update_table_index(table_id, &new_index).await?;
            }
        }

        // Let any in-flight merge land so its output is observed below
        core.wait_merge_file_finish().await;

        // IDMAP only waits for in-flight serialisations; everything else
        // must funnel through TO_INDEX into INDEX
        let watched: &[FileType] = if index.engine_type.is_idmap() {
            &[FileType::New, FileType::NewMerge]
        } else {
            &[
                FileType::Raw,
                FileType::New,
                FileType::NewMerge,
                FileType::NewIndex,
                FileType::ToIndex,
            ]
        };

        let mut pending = core.meta.files_by_type(table_id, watched).await?;
        let mut attempts: u32 = 1;
        while !pending.is_empty() {
            debug!(table_id, pending = pending.len(), attempts, "waiting for files to convert");
            if !index.engine_type.is_idmap() {
                core.meta.update_table_files_to_index(table_id).await?;
            }
            let backoff = Duration::from_millis(100).saturating_mul(attempts);
            tokio::time::sleep(backoff.min(CREATE_INDEX_MAX_BACKOFF)).await;
            pending = core.meta.files_by_type(table_id, watched).await?;
            attempts += 1;
        }
        Ok(())
    }

    pub async fn describe_index(&self, table_id: &str) -> Result<TableIndex> {
        self.core.check_running()?;
        self.core.meta.describe_table_index(table_id).await
    }

    pub async fn drop_index(&self, table_id: &str) -> Result<()> {
        self.core.check_running()?;
        debug!(table_id, "drop index");
        self.core.meta.drop_table_index(table_id).await
    }

    /// Warm the cache with today's searchable artifacts. Fails with
    /// `CacheFull` before the budget would be exceeded; nothing further is
    /// loaded after that point.
    pub async fn preload_table(&self, table_id: &str) -> Result<()> {
        let core = &self.core;
        core.check_running()?;

        let partitions = core.meta.files_to_search(table_id, &[], &[today()]).await?;

        let available = core.cache.capacity().saturating_sub(core.cache.usage());
        let mut cumulative: u64 = 0;
        for file in partitions.into_values().flatten() {
            let engine = core.factory.build(
                file.dimension,
                &file.location,
                file.engine_type,
                file.metric_type,
                file.nlist,
            )?;

            cumulative += engine.physical_size();
            if cumulative > available {
                return Err(Error::CacheFull);
            }
            tokio::task::spawn_blocking(move || engine.load(true))
                .await
                .map_err(|e| Error::engine(format!("preload task failed: {e}")))?
                .map_err(|e| Error::engine(format!("preload encountered: {e}")))?;
        }
        Ok(())
    }

    /// Top-k search over today's partition
    pub async fn query(
        &self,
        table_id: &str,
        topk: usize,
        nq: usize,
        nprobe: usize,
        vectors: &[f32],
    ) -> Result<QueryResult> {
        self.query_by_dates(table_id, topk, nq, nprobe, vectors, &[today()]).await
    }

    pub async fn query_by_dates(
        &self,
        table_id: &str,
        topk: usize,
        nq: usize,
        nprobe: usize,
        vectors: &[f32],
        dates: &[NaiveDate],
    ) -> Result<QueryResult> {
        let core = &self.core;
        core.check_running()?;
        debug!(table_id, dates = dates.len(), "query by dates");

        let partitions = core.meta.files_to_search(table_id, &[], dates).await?;
        let files: Vec<TableFile> = partitions.into_values().flatten().collect();

        core.cache.log_info();
        let result = core.query_async(files, topk, nq, nprobe, vectors).await;
        core.cache.log_info();
        result
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn query_by_file_ids(
        &self,
        table_id: &str,
        file_ids: &[String],
        topk: usize,
        nq: usize,
        nprobe: usize,
        vectors: &[f32],
        dates: &[NaiveDate],
    ) -> Result<QueryResult> {
        let core = &self.core;
        core.check_running()?;
        debug!(table_id, files = file_ids.len(), dates = dates.len(), "query by file ids");

        let ids = file_ids
            .iter()
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| Error::invalid_argument(format!("invalid file id: {raw}")))
            })
            .collect::<Result<Vec<u64>>>()?;

        let partitions = core.meta.files_to_search(table_id, &ids, dates).await?;
        let files: Vec<TableFile> = partitions.into_values().flatten().collect();
        if files.is_empty() {
            return Err(Error::invalid_argument("invalid file id"));
        }

        core.cache.log_info();
        let result = core.query_async(files, topk, nq, nprobe, vectors).await;
        core.cache.log_info();
        result
    }

    pub async fn size(&self) -> Result<u64> {
        self.core.check_running()?;
        self.core.meta.size().await
    }
}

impl DbCore {
    fn check_running(&self) -> Result<()> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(Error::ShuttingDown);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // query dispatch
    // ------------------------------------------------------------------

    async fn query_async(
        &self,
        files: Vec<TableFile>,
        topk: usize,
        nq: usize,
        nprobe: usize,
        vectors: &[f32],
    ) -> Result<QueryResult> {
        if topk == 0 || nq == 0 || nprobe == 0 {
            return Err(Error::invalid_argument("topk, nq and nprobe must be positive"));
        }
        if vectors.is_empty() || vectors.len() % nq != 0 {
            return Err(Error::invalid_argument(format!(
                "query batch of {} floats cannot hold {} vectors",
                vectors.len(),
                nq
            )));
        }

        self.metrics.record_query(nq as u64);
        let timer = Timer::new("query");
        debug!(files = files.len(), "engine query begin");

        let job = SearchJob::new(topk, nq, nprobe, vectors.to_vec(), files);
        self.jobs.put(Job::Search(job.clone()))?;

        let result = job.wait_result().await;
        if result.is_err() {
            self.metrics.record_query_error();
        }
        timer.stop();
        result
    }

    // ------------------------------------------------------------------
    // background timer
    // ------------------------------------------------------------------

    async fn background_timer_loop(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let mut tick = interval_at(Instant::now() + TIMER_INTERVAL, TIMER_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if self.shutting_down.load(Ordering::Acquire) {
                self.wait_merge_file_finish().await;
                self.wait_build_index_finish().await;
                debug!("database background thread exit");
                break;
            }

            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown_rx.changed() => continue,
            }

            self.start_metric_task().await;
            self.start_compaction_task().await;
            self.start_build_index_task().await;
        }
    }

    async fn wait_merge_file_finish(&self) {
        if let Some(handle) = self.compact_result.lock().await.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "compaction task exited abnormally");
            }
        }
    }

    async fn wait_build_index_finish(&self) {
        if let Some(handle) = self.index_result.lock().await.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "index task exited abnormally");
            }
        }
    }

    async fn start_metric_task(&self) {
        self.metrics.keep_alive();

        let capacity = self.cache.capacity();
        let usage = self.cache.usage();
        let percent = if capacity > 0 { usage * 100 / capacity } else { 0 };
        self.metrics.set_cache_usage_percent(percent);

        match self.meta.size().await {
            Ok(bytes) => self.metrics.set_data_file_size(bytes),
            Err(e) => warn!(error = %e, "failed to refresh data size gauge"),
        }
    }

    /// Flush buffers and remember which tables need compaction
    async fn mem_serialize(&self) {
        let _guard = self.mem_serialize_lock.lock().await;
        match self.mem.serialize().await {
            Ok(flushed) => {
                if !flushed.is_empty() {
                    debug!(tables = flushed.len(), "insert buffers serialized");
                    self.compact_table_ids.lock().extend(flushed);
                }
            }
            Err(e) => error!(error = %e, "memory serialization failed"),
        }
    }

    async fn start_compaction_task(self: &Arc<Self>) {
        self.mem_serialize().await;

        let mut slot = self.compact_result.lock().await;
        if let Some(handle) = slot.as_mut() {
            match tokio::time::timeout(REAP_TIMEOUT, &mut *handle).await {
                Ok(joined) => {
                    if let Err(e) = joined {
                        error!(error = %e, "compaction task exited abnormally");
                    }
                    *slot = None;
                }
                Err(_) => return, // still running
            }
        }

        let table_ids = std::mem::take(&mut *self.compact_table_ids.lock());
        let core = self.clone();
        *slot = Some(tokio::spawn(async move { core.background_compaction(table_ids).await }));
    }

    async fn background_compaction(self: Arc<Self>, table_ids: HashSet<String>) {
        for table_id in &table_ids {
            if let Err(e) = self.background_merge_files(table_id).await {
                error!(%table_id, error = %e, "merge files failed");
            }
            if self.shutting_down.load(Ordering::Acquire) {
                debug!("shutdown requested, skipping remaining merge work");
                break;
            }
        }

        if let Err(e) = self.meta.archive().await {
            error!(error = %e, "archive step failed");
        }
        let ttl = self.options.effective_file_ttl();
        if let Err(e) = self.meta.cleanup_files_with_ttl(ttl).await {
            error!(error = %e, "ttl sweep failed");
        }
    }

    async fn background_merge_files(&self, table_id: &str) -> Result<()> {
        let partitions = self.meta.files_to_merge(table_id).await?;

        for (date, files) in partitions {
            if files.len() < self.options.merge_trigger_number {
                debug!(table_id, %date, files = files.len(), "below merge trigger, skipping");
                continue;
            }
            if let Err(e) = self.merge_files(table_id, date, &files).await {
                error!(table_id, %date, error = %e, "merge failed");
                self.metrics.record_merge_error();
            }
            if self.shutting_down.load(Ordering::Acquire) {
                debug!(table_id, "shutdown requested, stopping merge loop");
                break;
            }
        }
        Ok(())
    }

    async fn merge_files(&self, table_id: &str, date: NaiveDate, files: &[TableFile]) -> Result<()> {
        debug!(table_id, %date, candidates = files.len(), "merging files");

        let mut target = self
            .meta
            .create_table_file(table_id, Some(date), FileType::NewMerge)
            .await?;

        let engine = self.factory.build(
            target.dimension,
            &target.location,
            target.engine_type,
            target.metric_type,
            target.nlist,
        )?;

        let mut updated: Vec<TableFile> = Vec::with_capacity(files.len() + 1);
        for file in files {
            let merge_engine = engine.clone();
            let location = file.location.clone();
            tokio::task::spawn_blocking(move || merge_engine.merge(&location))
                .await
                .map_err(|e| Error::engine(format!("merge task failed: {e}")))??;

            let mut consumed = file.clone();
            consumed.file_type = FileType::ToDelete;
            updated.push(consumed);
            debug!(file_id = file.file_id, "merged file");

            // Enough data for one artifact; the rest waits for the next tick
            if engine.size() >= target.index_file_size {
                break;
            }
        }

        let write_engine = engine.clone();
        let write = tokio::task::spawn_blocking(move || write_engine.serialize())
            .await
            .map_err(|e| Error::engine(format!("serialize task failed: {e}")))?;
        if let Err(e) = write {
            // Typical cause: out of disk space. Drop the target so the next
            // tick does not rediscover a stale NEW_MERGE.
            error!(
                location = %target.location,
                error = %e,
                "failed to persist merged file, possibly out of disk space"
            );
            target.file_type = FileType::ToDelete;
            self.meta.update_table_file(&target).await?;
            return Err(e);
        }

        target.file_type = if target.engine_type == EngineType::Idmap {
            FileType::Raw
        } else if engine.physical_size() >= target.index_file_size {
            FileType::ToIndex
        } else {
            FileType::Raw
        };
        target.file_size = engine.physical_size();
        target.row_count = engine.count();

        debug!(
            file_id = target.file_id,
            bytes = target.file_size,
            state = %target.file_type,
            "new merged file"
        );

        // One batch: consumed sources and the merged target become visible
        // together
        self.metrics.record_merge(updated.len() as u64);
        updated.push(target);
        self.meta.update_table_files(&updated).await?;

        if self.options.insert_cache_immediately {
            engine.cache()?;
        }
        Ok(())
    }

    async fn start_build_index_task(self: &Arc<Self>) {
        let mut slot = self.index_result.lock().await;
        if let Some(handle) = slot.as_mut() {
            match tokio::time::timeout(REAP_TIMEOUT, &mut *handle).await {
                Ok(joined) => {
                    if let Err(e) = joined {
                        error!(error = %e, "index task exited abnormally");
                    }
                    *slot = None;
                }
                Err(_) => return, // still running
            }
        }

        let core = self.clone();
        *slot = Some(tokio::spawn(async move { core.background_build_index().await }));
    }

    async fn background_build_index(self: Arc<Self>) {
        // Holding the lock for the whole job makes a concurrent
        // CreateIndex wait instead of reordering the index under us
        let _guard = self.build_index_lock.lock().await;

        let to_index = match self.meta.files_to_index().await {
            Ok(files) => files,
            Err(e) => {
                error!(error = %e, "failed to list files to index");
                return;
            }
        };
        if to_index.is_empty() {
            return;
        }

        debug!(files = to_index.len(), "background index build begin");
        let job = BuildIndexJob::new(to_index);
        if let Err(e) = self.jobs.put(Job::BuildIndex(job.clone())) {
            error!(error = %e, "failed to submit index build job");
            return;
        }
        // Per-file failures are recorded on the job; none of them may halt
        // the fleet
        if let Err(e) = job.wait_build_index_finish().await {
            error!(error = %e, "building index failed");
        }
    }
}

#[async_trait]
impl VectorDatabase for Database {
    async fn start(&self) -> Result<()> {
        Database::start(self).await
    }

    async fn stop(&self) -> Result<()> {
        Database::stop(self).await
    }

    async fn drop_all(&self) -> Result<()> {
        Database::drop_all(self).await
    }

    async fn create_table(&self, schema: TableSchema) -> Result<()> {
        Database::create_table(self, schema).await
    }

    async fn describe_table(&self, table_id: &str) -> Result<TableSchema> {
        Database::describe_table(self, table_id).await
    }

    async fn has_table(&self, table_id: &str) -> Result<bool> {
        Database::has_table(self, table_id).await
    }

    async fn all_tables(&self) -> Result<Vec<TableSchema>> {
        Database::all_tables(self).await
    }

    async fn delete_table(&self, table_id: &str, dates: &[NaiveDate]) -> Result<()> {
        Database::delete_table(self, table_id, dates).await
    }

    async fn update_table_flag(&self, table_id: &str, flag: i64) -> Result<()> {
        Database::update_table_flag(self, table_id, flag).await
    }

    async fn table_row_count(&self, table_id: &str) -> Result<u64> {
        Database::table_row_count(self, table_id).await
    }

    async fn insert_vectors(
        &self,
        table_id: &str,
        vectors: &[f32],
        ids: Option<Vec<u64>>,
    ) -> Result<Vec<u64>> {
        Database::insert_vectors(self, table_id, vectors, ids).await
    }

    async fn create_index(&self, table_id: &str, index: TableIndex) -> Result<()> {
        Database::create_index(self, table_id, index).await
    }

    async fn describe_index(&self, table_id: &str) -> Result<TableIndex> {
        Database::describe_index(self, table_id).await
    }

    async fn drop_index(&self, table_id: &str) -> Result<()> {
        Database::drop_index(self, table_id).await
    }

    async fn preload_table(&self, table_id: &str) -> Result<()> {
        Database::preload_table(self, table_id).await
    }

    async fn query(
        &self,
        table_id: &str,
        topk: usize,
        nq: usize,
        nprobe: usize,
        vectors: &[f32],
    ) -> Result<QueryResult> {
        Database::query(self, table_id, topk, nq, nprobe, vectors).await
    }

    async fn query_by_dates(
        &self,
        table_id: &str,
        topk: usize,
        nq: usize,
        nprobe: usize,
        vectors: &[f32],
        dates: &[NaiveDate],
    ) -> Result<QueryResult> {
        Database::query_by_dates(self, table_id, topk, nq, nprobe, vectors, dates).await
    }

    async fn query_by_file_ids(
        &self,
        table_id: &str,
        file_ids: &[String],
        topk: usize,
        nq: usize,
        nprobe: usize,
        vectors: &[f32],
        dates: &[NaiveDate],
    ) -> Result<QueryResult> {
        Database::query_by_file_ids(self, table_id, file_ids, topk, nq, nprobe, vectors, dates)
            .await
    }

    async fn size(&self) -> Result<u64> {
        Database::size(self).await
    }
}
