//! IVF segments: k-means coarse quantizer plus inverted lists, searched by
//! probing the `nprobe` nearest cells. Lists hold either f32 vectors
//! (IVFFLAT) or SQ8 codes (IVFSQ8).

use std::collections::BinaryHeap;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use quiver_core::error::{Error, Result};
use quiver_core::types::MetricType;

use crate::distance::{distance, distance_sq8, quantize_sq8};
use crate::flat::RawSegment;
use crate::traits::SearchHit;

pub(crate) const IVF_SEGMENT_MAGIC: &[u8; 8] = b"QVSEGIVF";
const IVF_SEGMENT_VERSION: u32 = 1;

/// Training stops after this many Lloyd iterations
const MAX_TRAIN_ITERS: usize = 10;
/// Training runs on at most this many vectors
const TRAIN_SAMPLE_LIMIT: usize = 16384;

/// Vector payload of one inverted list
#[derive(Debug, Clone)]
pub enum ListData {
    F32(Vec<f32>),
    Sq8 { codes: Vec<i8>, mins: Vec<f32>, ranges: Vec<f32> },
}

#[derive(Debug, Clone)]
pub struct IvfList {
    pub ids: Vec<u64>,
    pub data: ListData,
}

/// Built IVF index artifact
#[derive(Debug, Clone)]
pub struct IvfSegment {
    dimension: usize,
    metric: MetricType,
    quantized: bool,
    /// Contiguous `nlist * dimension` centroid storage
    centroids: Vec<f32>,
    lists: Vec<IvfList>,
}

impl IvfSegment {
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> MetricType {
        self.metric
    }

    pub fn nlist(&self) -> usize {
        self.lists.len()
    }

    pub fn len(&self) -> usize {
        self.lists.iter().map(|l| l.ids.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mem_size(&self) -> u64 {
        let mut bytes = self.centroids.len() * std::mem::size_of::<f32>();
        for list in &self.lists {
            bytes += list.ids.len() * std::mem::size_of::<u64>();
            bytes += match &list.data {
                ListData::F32(v) => v.len() * std::mem::size_of::<f32>(),
                ListData::Sq8 { codes, mins, ranges } => {
                    codes.len() + (mins.len() + ranges.len()) * std::mem::size_of::<f32>()
                }
            };
        }
        bytes as u64
    }

    fn centroid(&self, cell: usize) -> &[f32] {
        let start = cell * self.dimension;
        &self.centroids[start..start + self.dimension]
    }

    /// Cells to scan for `query`, nearest centroid first
    fn select_probes(&self, query: &[f32], nprobe: usize) -> Vec<usize> {
        let nprobe = nprobe.max(1).min(self.nlist());
        let mut scored: Vec<(usize, f32)> = (0..self.nlist())
            .map(|cell| (cell, distance(self.metric, query, self.centroid(cell))))
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(nprobe).map(|(cell, _)| cell).collect()
    }

    /// Top-k for one query, scanning `nprobe` cells
    pub fn search(&self, query: &[f32], k: usize, nprobe: usize) -> Vec<SearchHit> {
        if self.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut heap: BinaryHeap<SearchHit> = BinaryHeap::with_capacity(k + 1);
        for cell in self.select_probes(query, nprobe) {
            let list = &self.lists[cell];
            for (row, &id) in list.ids.iter().enumerate() {
                let d = match &list.data {
                    ListData::F32(vectors) => {
                        let start = row * self.dimension;
                        distance(self.metric, query, &vectors[start..start + self.dimension])
                    }
                    ListData::Sq8 { codes, mins, ranges } => {
                        let start = row * self.dimension;
                        distance_sq8(
                            self.metric,
                            query,
                            &codes[start..start + self.dimension],
                            mins[row],
                            ranges[row],
                        )
                    }
                };
                heap.push(SearchHit { id, distance: d });
                if heap.len() > k {
                    heap.pop();
                }
            }
        }

        let mut hits = heap.into_vec();
        hits.sort();
        hits
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut w = BufWriter::new(file);

        w.write_all(IVF_SEGMENT_MAGIC)?;
        w.write_u32::<LittleEndian>(IVF_SEGMENT_VERSION)?;
        w.write_u32::<LittleEndian>(self.dimension as u32)?;
        w.write_u8(match self.metric {
            MetricType::L2 => 0,
            MetricType::InnerProduct => 1,
        })?;
        w.write_u8(self.quantized as u8)?;
        w.write_u32::<LittleEndian>(self.nlist() as u32)?;

        for &c in &self.centroids {
            w.write_f32::<LittleEndian>(c)?;
        }

        for list in &self.lists {
            w.write_u64::<LittleEndian>(list.ids.len() as u64)?;
            for &id in &list.ids {
                w.write_u64::<LittleEndian>(id)?;
            }
            match &list.data {
                ListData::F32(vectors) => {
                    for &v in vectors {
                        w.write_f32::<LittleEndian>(v)?;
                    }
                }
                ListData::Sq8 { codes, mins, ranges } => {
                    for &c in codes {
                        w.write_i8(c)?;
                    }
                    for &m in mins {
                        w.write_f32::<LittleEndian>(m)?;
                    }
                    for &r in ranges {
                        w.write_f32::<LittleEndian>(r)?;
                    }
                }
            }
        }

        w.flush()?;
        Ok(())
    }

    /// Read a segment whose magic has already been consumed by the caller
    pub(crate) fn read_body(r: &mut impl Read) -> Result<Self> {
        let version = r.read_u32::<LittleEndian>()?;
        if version != IVF_SEGMENT_VERSION {
            return Err(Error::engine(format!("unsupported ivf segment version: {version}")));
        }

        let dimension = r.read_u32::<LittleEndian>()? as usize;
        let metric = match r.read_u8()? {
            0 => MetricType::L2,
            1 => MetricType::InnerProduct,
            other => return Err(Error::engine(format!("invalid metric tag: {other}"))),
        };
        let quantized = r.read_u8()? != 0;
        let nlist = r.read_u32::<LittleEndian>()? as usize;

        let mut centroids = vec![0f32; nlist * dimension];
        r.read_f32_into::<LittleEndian>(&mut centroids)?;

        let mut lists = Vec::with_capacity(nlist);
        for _ in 0..nlist {
            let n = r.read_u64::<LittleEndian>()? as usize;
            let mut ids = Vec::with_capacity(n);
            for _ in 0..n {
                ids.push(r.read_u64::<LittleEndian>()?);
            }
            let data = if quantized {
                let mut codes = vec![0i8; n * dimension];
                r.read_i8_into(&mut codes)?;
                let mut mins = vec![0f32; n];
                r.read_f32_into::<LittleEndian>(&mut mins)?;
                let mut ranges = vec![0f32; n];
                r.read_f32_into::<LittleEndian>(&mut ranges)?;
                ListData::Sq8 { codes, mins, ranges }
            } else {
                let mut vectors = vec![0f32; n * dimension];
                r.read_f32_into::<LittleEndian>(&mut vectors)?;
                ListData::F32(vectors)
            };
            lists.push(IvfList { ids, data });
        }

        Ok(Self { dimension, metric, quantized, centroids, lists })
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut r = BufReader::new(file);

        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != IVF_SEGMENT_MAGIC {
            return Err(Error::engine(format!("not an ivf segment: {}", path.display())));
        }
        Self::read_body(&mut r)
    }
}

/// Lloyd's k-means over row-major `data`, deterministic seeding.
/// Returns contiguous `k * dimension` centroids.
pub fn train_centroids(data: &[f32], dimension: usize, k: usize, metric: MetricType) -> Vec<f32> {
    let n = data.len() / dimension;
    let k = k.min(n).max(1);

    let row = |i: usize| &data[i * dimension..(i + 1) * dimension];

    // Sample the training set and the initial centroids
    let mut rng = StdRng::seed_from_u64((n as u64) ^ ((k as u64) << 32));
    let mut indices: Vec<usize> = (0..n).collect();
    if n > TRAIN_SAMPLE_LIMIT {
        indices.shuffle(&mut rng);
        indices.truncate(TRAIN_SAMPLE_LIMIT);
    }
    let mut seeds = indices.clone();
    seeds.shuffle(&mut rng);
    let mut centroids: Vec<f32> = seeds.iter().take(k).flat_map(|&i| row(i).to_vec()).collect();

    for _ in 0..MAX_TRAIN_ITERS {
        let mut sums = vec![0f32; k * dimension];
        let mut counts = vec![0usize; k];

        for &i in &indices {
            let v = row(i);
            let cell = nearest_centroid(&centroids, dimension, metric, v);
            counts[cell] += 1;
            let start = cell * dimension;
            for (dst, &src) in sums[start..start + dimension].iter_mut().zip(v.iter()) {
                *dst += src;
            }
        }

        let mut moved = false;
        for cell in 0..k {
            if counts[cell] == 0 {
                continue;
            }
            let inv = 1.0 / counts[cell] as f32;
            let start = cell * dimension;
            for d in 0..dimension {
                let next = sums[start + d] * inv;
                if (next - centroids[start + d]).abs() > f32::EPSILON {
                    moved = true;
                }
                centroids[start + d] = next;
            }
        }
        if !moved {
            break;
        }
    }

    centroids
}

fn nearest_centroid(centroids: &[f32], dimension: usize, metric: MetricType, v: &[f32]) -> usize {
    let k = centroids.len() / dimension;
    let mut best = 0usize;
    let mut best_d = f32::MAX;
    for cell in 0..k {
        let start = cell * dimension;
        let d = distance(metric, v, &centroids[start..start + dimension]);
        if d < best_d {
            best_d = d;
            best = cell;
        }
    }
    best
}

/// Train an IVF segment from raw data
pub fn build_ivf(raw: &RawSegment, metric: MetricType, nlist: u32, quantized: bool) -> Result<IvfSegment> {
    if raw.is_empty() {
        return Err(Error::engine("cannot build an index from an empty segment"));
    }

    let dimension = raw.dimension();
    let centroids = train_centroids(raw.vectors(), dimension, nlist as usize, metric);
    let k = centroids.len() / dimension;

    let mut lists: Vec<IvfList> = (0..k)
        .map(|_| IvfList {
            ids: Vec::new(),
            data: if quantized {
                ListData::Sq8 { codes: Vec::new(), mins: Vec::new(), ranges: Vec::new() }
            } else {
                ListData::F32(Vec::new())
            },
        })
        .collect();

    for (row, &id) in raw.ids().iter().enumerate() {
        let v = raw.vector(row);
        let cell = nearest_centroid(&centroids, dimension, metric, v);
        let list = &mut lists[cell];
        list.ids.push(id);
        match &mut list.data {
            ListData::F32(vectors) => vectors.extend_from_slice(v),
            ListData::Sq8 { codes, mins, ranges } => {
                let (c, min, range) = quantize_sq8(v);
                codes.extend_from_slice(&c);
                mins.push(min);
                ranges.push(range);
            }
        }
    }

    Ok(IvfSegment { dimension, metric, quantized, centroids, lists })
}
