//! # Job Scheduler
//!
//! Owns the worker tasks that execute search, index-build and delete
//! jobs. The coordinator submits a job and blocks on its wait method;
//! engine work runs under `spawn_blocking` so workers never stall the
//! runtime.

mod jobs;

pub use jobs::{BuildIndexJob, DeleteJob, Job, SearchJob};

use std::collections::BinaryHeap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use quiver_core::error::{Error, Result};
use quiver_core::metrics::Metrics;
use quiver_core::types::{FileType, QueryResult, TableFile, TableIndex};
use quiver_index::{EngineFactory, ExecutionEngine, SearchHit};

use crate::meta::MetaStore;

struct JobContext {
    meta: Arc<dyn MetaStore>,
    factory: Arc<EngineFactory>,
    metrics: Metrics,
    insert_cache_immediately: bool,
}

pub struct JobManager {
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobManager {
    pub fn new(
        meta: Arc<dyn MetaStore>,
        factory: Arc<EngineFactory>,
        metrics: Metrics,
        insert_cache_immediately: bool,
        worker_count: usize,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(AsyncMutex::new(rx));
        let ctx = Arc::new(JobContext { meta, factory, metrics, insert_cache_immediately });

        let workers = (0..worker_count.max(1))
            .map(|worker| tokio::spawn(worker_loop(worker, rx.clone(), ctx.clone())))
            .collect();

        Self { tx: Mutex::new(Some(tx)), workers: Mutex::new(workers) }
    }

    /// Enqueue a job for execution
    pub fn put(&self, job: Job) -> Result<()> {
        match self.tx.lock().as_ref() {
            Some(tx) => tx.send(job).map_err(|_| Error::job("scheduler has stopped")),
            None => Err(Error::job("scheduler has stopped")),
        }
    }

    /// Close the queue and drain the workers. Jobs already enqueued still
    /// run to completion.
    pub async fn shutdown(&self) {
        drop(self.tx.lock().take());
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "scheduler worker exited abnormally");
            }
        }
    }
}

async fn worker_loop(worker: usize, rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Job>>>, ctx: Arc<JobContext>) {
    loop {
        let job = { rx.lock().await.recv().await };
        match job {
            None => {
                debug!(worker, "scheduler worker exit");
                break;
            }
            Some(Job::Search(job)) => {
                let result = execute_search(&ctx, &job).await;
                job.finish(result);
            }
            Some(Job::BuildIndex(job)) => {
                let result = execute_build_index(&ctx, &job).await;
                job.finish(result);
            }
            Some(Job::Delete(job)) => {
                let result = execute_delete(&ctx, &job).await;
                job.finish(result);
            }
        }
    }
}

// ----------------------------------------------------------------------
// search
// ----------------------------------------------------------------------

async fn execute_search(ctx: &JobContext, job: &SearchJob) -> Result<()> {
    let nq = job.nq();
    let topk = job.topk();
    let dimension = job.vectors().len() / nq;
    debug!(files = job.files().len(), nq, topk, "search job begin");

    let mut best: Vec<BinaryHeap<SearchHit>> =
        (0..nq).map(|_| BinaryHeap::with_capacity(topk + 1)).collect();

    for file in job.files() {
        if file.dimension as usize != dimension {
            return Err(Error::invalid_argument(format!(
                "file {} holds dimension {}, query batch has dimension {}",
                file.file_id, file.dimension, dimension
            )));
        }

        let engine = ctx.factory.build(
            file.dimension,
            &file.location,
            file.engine_type,
            file.metric_type,
            file.nlist,
        )?;
        let vectors = job.vectors();
        let nprobe = job.nprobe();
        let per_file = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<SearchHit>>> {
            engine.load(false)?;
            engine.search(&vectors, topk, nprobe)
        })
        .await
        .map_err(|e| Error::job(format!("search task failed: {e}")))??;

        // Fold this file's top-k into the global per-query top-k
        for (query, hits) in per_file.into_iter().enumerate() {
            let heap = &mut best[query];
            for hit in hits {
                heap.push(hit);
                if heap.len() > topk {
                    heap.pop();
                }
            }
        }
    }

    let mut result = QueryResult::with_capacity(nq, topk);
    for heap in best {
        let mut hits = heap.into_vec();
        hits.sort();
        for slot in 0..topk {
            match hits.get(slot) {
                Some(hit) => {
                    result.ids.push(hit.id);
                    result.distances.push(hit.distance);
                }
                None => {
                    result.ids.push(u64::MAX);
                    result.distances.push(f32::MAX);
                }
            }
        }
    }
    job.set_result(result);
    Ok(())
}

// ----------------------------------------------------------------------
// index build
// ----------------------------------------------------------------------

async fn execute_build_index(ctx: &JobContext, job: &BuildIndexJob) -> Result<()> {
    let mut last_error = None;
    for file in job.files() {
        if let Err(e) = build_one(ctx, file).await {
            error!(
                file_id = file.file_id,
                table_id = %file.table_id,
                error = %e,
                "index build failed"
            );
            ctx.metrics.record_index_build_error();
            last_error = Some(e);
        }
    }
    match last_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn build_one(ctx: &JobContext, file: &TableFile) -> Result<()> {
    // The file may have moved on (merged, dropped) since the listing
    let fresh = ctx
        .meta
        .table_files(&file.table_id)
        .await?
        .into_iter()
        .find(|f| f.file_id == file.file_id);
    let fresh = match fresh {
        Some(f) if f.file_type == FileType::ToIndex => f,
        _ => {
            debug!(file_id = file.file_id, "file left TO_INDEX, skipping build");
            return Ok(());
        }
    };

    // Target inherits the table's *current* index params
    let mut target = ctx
        .meta
        .create_table_file(&fresh.table_id, Some(fresh.date), FileType::NewIndex)
        .await?;

    if target.engine_type.is_idmap() {
        // Index was dropped between listing and build; put the raw data back
        let mut source = fresh;
        source.file_type = FileType::Raw;
        target.file_type = FileType::ToDelete;
        ctx.meta.update_table_files(&[target, source]).await?;
        return Ok(());
    }

    let source_engine = ctx.factory.build(
        fresh.dimension,
        &fresh.location,
        fresh.engine_type,
        fresh.metric_type,
        fresh.nlist,
    )?;
    let index = TableIndex {
        engine_type: target.engine_type,
        nlist: target.nlist,
        metric_type: target.metric_type,
    };
    let location = target.location.clone();
    let build = tokio::task::spawn_blocking(move || -> Result<Arc<dyn ExecutionEngine>> {
        source_engine.load(false)?;
        source_engine.build_index(&location, &index)
    })
    .await
    .map_err(|e| Error::job(format!("index build task failed: {e}")))?;

    let built = match build {
        Ok(built) => built,
        Err(e) => {
            target.file_type = FileType::ToDelete;
            ctx.meta.update_table_file(&target).await?;
            return Err(e);
        }
    };

    // Commit target and source together so no observer sees the data twice
    // or not at all
    target.file_type = FileType::Index;
    target.file_size = built.physical_size();
    target.row_count = built.count();
    let mut source = fresh;
    source.file_type = FileType::Backup;
    let target_id = target.file_id;
    ctx.meta.update_table_files(&[target, source]).await?;

    if ctx.insert_cache_immediately {
        if let Err(e) = built.cache() {
            warn!(error = %e, "failed to cache freshly built index");
        }
    }
    ctx.metrics.record_index_built();
    debug!(file_id = target_id, "index file committed");
    Ok(())
}

// ----------------------------------------------------------------------
// delete
// ----------------------------------------------------------------------

async fn execute_delete(ctx: &JobContext, job: &DeleteJob) -> Result<()> {
    let files = ctx.meta.table_files(job.table_id()).await?;
    for file in &files {
        ctx.factory.cache().erase(&file.location);
    }
    ctx.meta.delete_table_files(job.table_id()).await?;
    debug!(table_id = %job.table_id(), files = files.len(), "table artifacts released");
    Ok(())
}
