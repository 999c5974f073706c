//! One table's in-memory vector buffer.

use quiver_core::error::{Error, Result};
use quiver_core::types::TableSchema;

pub struct TableBuffer {
    schema: TableSchema,
    ids: Vec<u64>,
    /// Row-major storage, `len() * dimension` floats
    vectors: Vec<f32>,
}

impl TableBuffer {
    pub fn new(schema: TableSchema) -> Self {
        Self { schema, ids: Vec::new(), vectors: Vec::new() }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
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

    pub fn mem_size(&self) -> u64 {
        (self.ids.len() * std::mem::size_of::<u64>()
            + self.vectors.len() * std::mem::size_of::<f32>()) as u64
    }

    pub fn push(&mut self, ids: &[u64], vectors: &[f32]) -> Result<()> {
        let dimension = self.schema.dimension as usize;
        if vectors.len() != ids.len() * dimension {
            return Err(Error::invalid_argument(format!(
                "expected {} floats for {} vectors of dimension {}, got {}",
                ids.len() * dimension,
                ids.len(),
                dimension,
                vectors.len()
            )));
        }
        self.ids.extend_from_slice(ids);
        self.vectors.extend_from_slice(vectors);
        Ok(())
    }
}
