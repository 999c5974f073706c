//! Loaded-artifact representation and the on-disk dispatch between the
//! two segment formats.

use std::io::{BufReader, Read};
use std::path::Path;

use quiver_core::error::{Error, Result};
use quiver_core::types::MetricType;

use crate::flat::{RawSegment, RAW_SEGMENT_MAGIC};
use crate::ivf::{IvfSegment, IVF_SEGMENT_MAGIC};
use crate::traits::SearchHit;

/// One artifact brought into memory
#[derive(Debug, Clone)]
pub enum SegmentData {
    Raw(RawSegment),
    Ivf(IvfSegment),
}

impl SegmentData {
    pub fn dimension(&self) -> usize {
        match self {
            SegmentData::Raw(s) => s.dimension(),
            SegmentData::Ivf(s) => s.dimension(),
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            SegmentData::Raw(s) => s.len() as u64,
            SegmentData::Ivf(s) => s.len() as u64,
        }
    }

    pub fn mem_size(&self) -> u64 {
        match self {
            SegmentData::Raw(s) => s.mem_size(),
            SegmentData::Ivf(s) => s.mem_size(),
        }
    }

    /// Top-k for one query; `nprobe` only applies to IVF artifacts
    pub fn search(&self, metric: MetricType, query: &[f32], k: usize, nprobe: usize) -> Vec<SearchHit> {
        match self {
            SegmentData::Raw(s) => s.search(metric, query, k),
            SegmentData::Ivf(s) => s.search(query, k, nprobe),
        }
    }
}

/// Read whichever segment format lives at `path`
pub fn read_segment(path: &Path) -> Result<SegmentData> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::engine(format!("cannot open segment {}: {e}", path.display())))?;
    let mut r = BufReader::new(file);

    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)?;
    match &magic {
        m if m == RAW_SEGMENT_MAGIC => Ok(SegmentData::Raw(RawSegment::read_body(&mut r)?)),
        m if m == IVF_SEGMENT_MAGIC => Ok(SegmentData::Ivf(IvfSegment::read_body(&mut r)?)),
        _ => Err(Error::engine(format!("unrecognised segment format: {}", path.display()))),
    }
}
