//! In-memory [`VectorStore`] implementation for tests and local runs.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Search is brute-force
//! cosine similarity over every record that passes the filter; ties keep
//! insertion order, so results are stable across identical inputs.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{RagError, RagResult};
use crate::filter::Filter;
use crate::models::{ChunkProperties, ChunkRecord, StoreMatch};

use super::VectorStore;

/// In-memory store for tests and single-process deployments.
pub struct InMemoryStore {
    records: RwLock<Vec<ChunkRecord>>,
    dims: Option<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            dims: None,
        }
    }

    /// A store that rejects vectors whose length is not `dims`.
    pub fn with_dims(dims: usize) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            dims: Some(dims),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the stored properties, in insertion order.
    pub fn properties(&self) -> Vec<ChunkProperties> {
        self.records
            .read()
            .map(|r| r.iter().map(|rec| rec.properties.clone()).collect())
            .unwrap_or_default()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> RagError {
    RagError::external("memory store", "lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert(&self, record: ChunkRecord) -> RagResult<()> {
        if let Some(dims) = self.dims {
            if record.vector.len() != dims {
                return Err(RagError::external(
                    "memory store",
                    format!(
                        "vector has {} dimensions, collection expects {}",
                        record.vector.len(),
                        dims
                    ),
                ));
            }
        }
        let mut records = self.records.write().map_err(|_| poisoned())?;
        if records.iter().any(|r| r.id == record.id) {
            return Err(RagError::external(
                "memory store",
                format!("record {} already exists", record.id),
            ));
        }
        records.push(record);
        Ok(())
    }

    async fn near_vector(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&Filter>,
    ) -> RagResult<Vec<StoreMatch>> {
        if let Some(f) = filter {
            f.validate()?;
        }
        let records = self.records.read().map_err(|_| poisoned())?;

        let mut matches = Vec::new();
        for record in records.iter() {
            if let Some(f) = filter {
                if !f.matches(&record.properties)? {
                    continue;
                }
            }
            matches.push(StoreMatch {
                properties: record.properties.clone(),
                score: Some(cosine_similarity(vector, &record.vector)),
            });
        }

        // `sort_by` is stable: equal scores keep insertion order.
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);
        Ok(matches)
    }
}
