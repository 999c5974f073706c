//! Raw segments: ids plus contiguous f32 vectors, searched by brute force.
//!
//! This is the storage form of every freshly flushed or merged file, and
//! the terminal form for IDMAP tables.

use std::collections::BinaryHeap;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use quiver_core::error::{Error, Result};
use quiver_core::types::MetricType;

use crate::distance::distance;
use crate::traits::SearchHit;

pub(crate) const RAW_SEGMENT_MAGIC: &[u8; 8] = b"QVSEGRAW";
const RAW_SEGMENT_VERSION: u32 = 1;

/// Raw vector segment
#[derive(Debug, Clone, Default)]
pub struct RawSegment {
    dimension: usize,
    ids: Vec<u64>,
    /// Contiguous storage: `[v0_d0, .., v0_dn, v1_d0, ..]`
    vectors: Vec<f32>,
}

impl RawSegment {
    pub fn new(dimension: usize) -> Self {
        Self { dimension, ids: Vec::new(), vectors: Vec::new() }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    pub fn vectors(&self) -> &[f32] {
        &self.vectors
    }

    pub fn vector(&self, row: usize) -> &[f32] {
        let start = row * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    /// Logical in-memory size in bytes
    pub fn mem_size(&self) -> u64 {
        (self.ids.len() * std::mem::size_of::<u64>()
            + self.vectors.len() * std::mem::size_of::<f32>()) as u64
    }

    /// Append a batch of vectors
    pub fn push(&mut self, ids: &[u64], vectors: &[f32]) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::engine("segment dimension is not set"));
        }
        if vectors.len() != ids.len() * self.dimension {
            return Err(Error::engine(format!(
                "expected {} floats for {} vectors of dimension {}, got {}",
                ids.len() * self.dimension,
                ids.len(),
                self.dimension,
                vectors.len()
            )));
        }
        self.ids.extend_from_slice(ids);
        self.vectors.extend_from_slice(vectors);
        Ok(())
    }

    /// Exact top-k for one query
    pub fn search(&self, metric: MetricType, query: &[f32], k: usize) -> Vec<SearchHit> {
        if self.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut heap: BinaryHeap<SearchHit> = BinaryHeap::with_capacity(k + 1);
        for (row, &id) in self.ids.iter().enumerate() {
            let d = distance(metric, query, self.vector(row));
            heap.push(SearchHit { id, distance: d });
            if heap.len() > k {
                heap.pop();
            }
        }

        let mut hits = heap.into_vec();
        hits.sort();
        hits
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut w = BufWriter::new(file);

        w.write_all(RAW_SEGMENT_MAGIC)?;
        w.write_u32::<LittleEndian>(RAW_SEGMENT_VERSION)?;
        w.write_u32::<LittleEndian>(self.dimension as u32)?;
        w.write_u64::<LittleEndian>(self.ids.len() as u64)?;

        for &id in &self.ids {
            w.write_u64::<LittleEndian>(id)?;
        }
        for &v in &self.vectors {
            w.write_f32::<LittleEndian>(v)?;
        }

        w.flush()?;
        Ok(())
    }

    /// Read a segment whose magic has already been consumed by the caller
    pub(crate) fn read_body(r: &mut impl Read) -> Result<Self> {
        let version = r.read_u32::<LittleEndian>()?;
        if version != RAW_SEGMENT_VERSION {
            return Err(Error::engine(format!("unsupported raw segment version: {version}")));
        }

        let dimension = r.read_u32::<LittleEndian>()? as usize;
        let n = r.read_u64::<LittleEndian>()? as usize;

        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            ids.push(r.read_u64::<LittleEndian>()?);
        }
        let mut vectors = vec![0f32; n * dimension];
        r.read_f32_into::<LittleEndian>(&mut vectors)?;

        Ok(Self { dimension, ids, vectors })
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut r = BufReader::new(file);

        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != RAW_SEGMENT_MAGIC {
            return Err(Error::engine(format!("not a raw segment: {}", path.display())));
        }
        Self::read_body(&mut r)
    }
}
