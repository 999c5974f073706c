//! Job objects submitted to the scheduler.
//!
//! A job is shared (`Arc`) between the submitter, which blocks on the
//! wait method, and the worker that executes it. Completion is a watch
//! channel; a failure status is handed to the single waiter.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use quiver_core::error::{Error, Result};
use quiver_core::types::{QueryResult, TableFile};

pub(crate) struct JobState {
    done: watch::Sender<bool>,
    status: Mutex<Option<Error>>,
}

impl JobState {
    fn new() -> Self {
        let (done, _) = watch::channel(false);
        Self { done, status: Mutex::new(None) }
    }

    pub(crate) fn finish(&self, result: Result<()>) {
        if let Err(e) = result {
            *self.status.lock() = Some(e);
        }
        let _ = self.done.send(true);
    }

    async fn wait(&self) -> Result<()> {
        let mut rx = self.done.subscribe();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
        match self.status.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Top-k search over an explicit file set
pub struct SearchJob {
    topk: usize,
    nq: usize,
    nprobe: usize,
    vectors: Arc<Vec<f32>>,
    files: Vec<TableFile>,
    result: Mutex<QueryResult>,
    state: JobState,
}

impl SearchJob {
    pub fn new(
        topk: usize,
        nq: usize,
        nprobe: usize,
        vectors: Vec<f32>,
        files: Vec<TableFile>,
    ) -> Arc<Self> {
        Arc::new(Self {
            topk,
            nq,
            nprobe,
            vectors: Arc::new(vectors),
            files,
            result: Mutex::new(QueryResult::default()),
            state: JobState::new(),
        })
    }

    /// Block until the scheduler finishes, then take the ranked results
    pub async fn wait_result(&self) -> Result<QueryResult> {
        self.state.wait().await?;
        Ok(std::mem::take(&mut *self.result.lock()))
    }

    pub(crate) fn topk(&self) -> usize {
        self.topk
    }

    pub(crate) fn nq(&self) -> usize {
        self.nq
    }

    pub(crate) fn nprobe(&self) -> usize {
        self.nprobe
    }

    pub(crate) fn vectors(&self) -> Arc<Vec<f32>> {
        self.vectors.clone()
    }

    pub(crate) fn files(&self) -> &[TableFile] {
        &self.files
    }

    pub(crate) fn set_result(&self, result: QueryResult) {
        *self.result.lock() = result;
    }

    pub(crate) fn finish(&self, result: Result<()>) {
        self.state.finish(result);
    }
}

/// Convert a batch of `ToIndex` files into `Index` artifacts
pub struct BuildIndexJob {
    files: Vec<TableFile>,
    state: JobState,
}

impl BuildIndexJob {
    pub fn new(files: Vec<TableFile>) -> Arc<Self> {
        Arc::new(Self { files, state: JobState::new() })
    }

    pub async fn wait_build_index_finish(&self) -> Result<()> {
        self.state.wait().await
    }

    pub(crate) fn files(&self) -> &[TableFile] {
        &self.files
    }

    pub(crate) fn finish(&self, result: Result<()>) {
        self.state.finish(result);
    }
}

/// Release a dropped table's cached artifacts, then mark its files for
/// reclamation
pub struct DeleteJob {
    table_id: String,
    state: JobState,
}

impl DeleteJob {
    pub fn new(table_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { table_id: table_id.into(), state: JobState::new() })
    }

    pub async fn wait_and_delete(&self) -> Result<()> {
        self.state.wait().await
    }

    pub(crate) fn table_id(&self) -> &str {
        &self.table_id
    }

    pub(crate) fn finish(&self, result: Result<()>) {
        self.state.finish(result);
    }
}

/// What the scheduler's queue carries
#[derive(Clone)]
pub enum Job {
    Search(Arc<SearchJob>),
    BuildIndex(Arc<BuildIndexJob>),
    Delete(Arc<DeleteJob>),
}
