//! The segment execution engine and its factory.
//!
//! `SegmentEngine` fronts one artifact. Fresh flush/merge targets
//! accumulate raw vectors in a buffer until `serialize()`; existing
//! artifacts are brought in through the cache by `load()`. Raw data is
//! searched by brute force whatever the table's engine family says —
//! the family only decides what `build_index` produces.

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use quiver_core::error::{Error, Result};
use quiver_core::types::{EngineType, MetricType, TableIndex};

use crate::cache::IndexCache;
use crate::flat::RawSegment;
use crate::ivf::build_ivf;
use crate::segment::{read_segment, SegmentData};
use crate::traits::{ExecutionEngine, SearchHit};

pub struct SegmentEngine {
    location: String,
    dimension: usize,
    engine_type: EngineType,
    metric: MetricType,
    nlist: u32,
    cache: Arc<IndexCache>,
    /// Accumulation buffer for not-yet-serialized targets
    buffer: Mutex<RawSegment>,
    /// Artifact brought in from the cache or disk
    loaded: RwLock<Option<Arc<SegmentData>>>,
}

impl SegmentEngine {
    fn new(
        dimension: usize,
        location: &str,
        engine_type: EngineType,
        metric: MetricType,
        nlist: u32,
        cache: Arc<IndexCache>,
    ) -> Self {
        Self {
            location: location.to_string(),
            dimension,
            engine_type,
            metric,
            nlist,
            cache,
            buffer: Mutex::new(RawSegment::new(dimension)),
            loaded: RwLock::new(None),
        }
    }

    pub fn engine_type(&self) -> EngineType {
        self.engine_type
    }

    pub fn nlist(&self) -> u32 {
        self.nlist
    }

    fn loaded_data(&self) -> Result<Arc<SegmentData>> {
        if let Some(data) = self.loaded.read().as_ref() {
            return Ok(data.clone());
        }
        self.load(false)?;
        self.loaded
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| Error::engine(format!("artifact not loaded: {}", self.location)))
    }
}

impl ExecutionEngine for SegmentEngine {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn count(&self) -> u64 {
        if let Some(data) = self.loaded.read().as_ref() {
            return data.count();
        }
        self.buffer.lock().len() as u64
    }

    fn size(&self) -> u64 {
        if let Some(data) = self.loaded.read().as_ref() {
            return data.mem_size();
        }
        self.buffer.lock().mem_size()
    }

    fn physical_size(&self) -> u64 {
        std::fs::metadata(&self.location).map(|m| m.len()).unwrap_or(0)
    }

    fn add_with_ids(&self, ids: &[u64], vectors: &[f32]) -> Result<()> {
        self.buffer.lock().push(ids, vectors)
    }

    fn load(&self, _index_only: bool) -> Result<()> {
        if self.loaded.read().is_some() {
            return Ok(());
        }

        let data = match self.cache.get(&self.location) {
            Some(data) => data,
            None => {
                let data = Arc::new(read_segment(Path::new(&self.location))?);
                self.cache.insert(&self.location, data.clone());
                data
            }
        };
        *self.loaded.write() = Some(data);
        Ok(())
    }

    fn merge(&self, location: &str) -> Result<()> {
        let source = match self.cache.get(location) {
            Some(data) => data,
            None => Arc::new(read_segment(Path::new(location))?),
        };
        match source.as_ref() {
            SegmentData::Raw(raw) => self.buffer.lock().push(raw.ids(), raw.vectors()),
            SegmentData::Ivf(_) => {
                Err(Error::engine(format!("cannot merge an index segment: {location}")))
            }
        }
    }

    fn serialize(&self) -> Result<()> {
        let mut buffer = self.buffer.lock();
        if !buffer.is_empty() {
            buffer.write_to(Path::new(&self.location))?;
            let segment = std::mem::replace(&mut *buffer, RawSegment::new(self.dimension));
            *self.loaded.write() = Some(Arc::new(SegmentData::Raw(segment)));
            debug!(location = %self.location, "raw segment serialized");
            return Ok(());
        }
        drop(buffer);

        match self.loaded.read().as_ref() {
            Some(data) => {
                match data.as_ref() {
                    SegmentData::Raw(raw) => raw.write_to(Path::new(&self.location))?,
                    SegmentData::Ivf(ivf) => ivf.write_to(Path::new(&self.location))?,
                }
                Ok(())
            }
            None => Err(Error::engine(format!("nothing to serialize: {}", self.location))),
        }
    }

    fn cache(&self) -> Result<()> {
        let data = self.loaded_data()?;
        self.cache.insert(&self.location, data);
        Ok(())
    }

    fn build_index(&self, location: &str, index: &TableIndex) -> Result<Arc<dyn ExecutionEngine>> {
        if index.engine_type.is_idmap() {
            return Err(Error::engine("IDMAP tables carry no secondary index"));
        }

        let data = self.loaded_data()?;
        let raw = match data.as_ref() {
            SegmentData::Raw(raw) => raw,
            SegmentData::Ivf(_) => {
                return Err(Error::engine(format!(
                    "already an index segment: {}",
                    self.location
                )))
            }
        };

        let quantized = index.engine_type == EngineType::IvfSq8;
        let ivf = build_ivf(raw, self.metric, index.nlist, quantized)?;
        ivf.write_to(Path::new(location))?;
        debug!(source = %self.location, target = location, nlist = index.nlist, "index built");

        let engine = SegmentEngine::new(
            self.dimension,
            location,
            index.engine_type,
            self.metric,
            index.nlist,
            self.cache.clone(),
        );
        *engine.loaded.write() = Some(Arc::new(SegmentData::Ivf(ivf)));
        Ok(Arc::new(engine))
    }

    fn search(&self, queries: &[f32], k: usize, nprobe: usize) -> Result<Vec<Vec<SearchHit>>> {
        if queries.len() % self.dimension != 0 {
            return Err(Error::engine(format!(
                "query batch of {} floats is not a multiple of dimension {}",
                queries.len(),
                self.dimension
            )));
        }

        let data = self.loaded_data()?;
        Ok(queries
            .chunks_exact(self.dimension)
            .map(|query| data.search(self.metric, query, k, nprobe))
            .collect())
    }
}

/// Builds engines around one shared cache (injected, never global)
pub struct EngineFactory {
    cache: Arc<IndexCache>,
}

impl EngineFactory {
    pub fn new(cache: Arc<IndexCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<IndexCache> {
        &self.cache
    }

    pub fn build(
        &self,
        dimension: u16,
        location: &str,
        engine_type: EngineType,
        metric: MetricType,
        nlist: u32,
    ) -> Result<Arc<dyn ExecutionEngine>> {
        if dimension == 0 {
            return Err(Error::engine("cannot build an engine for dimension 0"));
        }
        Ok(Arc::new(SegmentEngine::new(
            dimension as usize,
            location,
            engine_type,
            metric,
            nlist,
            self.cache.clone(),
        )))
    }
}
