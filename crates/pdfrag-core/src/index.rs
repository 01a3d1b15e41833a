//! Index writer: turns embedded chunks into vector-store records.
//!
//! Inserts are per record. A failed insert is recorded against its chunk
//! index and the writer moves on, so a large document that partially fails
//! can be resumed at chunk granularity instead of starting over.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{RagError, RagResult};
use crate::models::{ChunkRecord, DocumentMeta, EmbeddedChunk};
use crate::store::VectorStore;

/// Why one chunk did not make it into the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    /// Stable error kind, see [`RagError::kind`].
    pub kind: String,
    pub message: String,
}

impl ChunkFailure {
    pub fn new(chunk_index: usize, err: &RagError) -> Self {
        Self {
            chunk_index,
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Overall outcome of writing one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    /// Every chunk was written (including documents with zero chunks).
    Success,
    /// Some chunks were written, some failed.
    Partial,
    /// Chunks existed but none were written.
    Failed,
}

/// Per-chunk result of writing one document, sorted by chunk index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub document_id: Uuid,
    /// Number of chunks processed.
    pub chunks: usize,
    pub succeeded: Vec<usize>,
    pub failed: Vec<ChunkFailure>,
}

impl IngestReport {
    pub fn new(document_id: Uuid) -> Self {
        Self {
            document_id,
            chunks: 0,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Report built from per-chunk outcomes, in any order.
    pub fn from_outcomes(
        document_id: Uuid,
        outcomes: impl IntoIterator<Item = (usize, RagResult<()>)>,
    ) -> Self {
        let mut report = Self::new(document_id);
        for (chunk_index, outcome) in outcomes {
            report.record(chunk_index, outcome);
        }
        report.finish()
    }

    pub fn record(&mut self, chunk_index: usize, outcome: RagResult<()>) {
        self.chunks += 1;
        match outcome {
            Ok(()) => self.succeeded.push(chunk_index),
            Err(e) => {
                tracing::warn!(
                    document_id = %self.document_id,
                    chunk_index,
                    error = %e,
                    "chunk was not indexed"
                );
                self.failed.push(ChunkFailure::new(chunk_index, &e));
            }
        }
    }

    /// Sort both lists by chunk index (concurrent writes finish out of order).
    pub fn finish(mut self) -> Self {
        self.succeeded.sort_unstable();
        self.failed.sort_by_key(|f| f.chunk_index);
        self
    }

    pub fn status(&self) -> IngestStatus {
        if self.failed.is_empty() {
            IngestStatus::Success
        } else if self.succeeded.is_empty() {
            IngestStatus::Failed
        } else {
            IngestStatus::Partial
        }
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.failed.iter().map(|f| f.chunk_index).collect()
    }
}

/// Writes chunk records for one document into a [`VectorStore`].
pub struct IndexWriter<'a> {
    store: &'a dyn VectorStore,
}

impl<'a> IndexWriter<'a> {
    pub fn new(store: &'a dyn VectorStore) -> Self {
        Self { store }
    }

    /// Insert the record for a single chunk.
    pub async fn write_one(&self, doc: &DocumentMeta, embedded: EmbeddedChunk) -> RagResult<()> {
        self.store.insert(ChunkRecord::new(doc, embedded)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageChunk;
    use crate::store::memory::InMemoryStore;

    async fn write_all(
        writer: &IndexWriter<'_>,
        doc: &DocumentMeta,
        chunks: Vec<EmbeddedChunk>,
    ) -> IngestReport {
        let mut outcomes = Vec::new();
        for embedded in chunks {
            let index = embedded.chunk.chunk_index;
            outcomes.push((index, writer.write_one(doc, embedded).await));
        }
        IngestReport::from_outcomes(doc.document_id, outcomes)
    }

    fn embedded(index: usize) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: PageChunk {
                chunk_index: index,
                page_number: Some(1),
                content: format!("chunk {}", index),
            },
            vector: vec![1.0, 0.0],
        }
    }

    #[tokio::test]
    async fn test_writes_every_chunk_with_metadata() {
        let store = InMemoryStore::new();
        let doc = DocumentMeta::new("doc.pdf", "proj-123", vec!["pdf".into()]);
        let writer = IndexWriter::new(&store);
        let report = write_all(&writer, &doc, (0..3).map(embedded).collect()).await;

        assert_eq!(report.status(), IngestStatus::Success);
        assert_eq!(report.succeeded, vec![0, 1, 2]);
        assert_eq!(report.chunks, 3);

        let stored = store.properties();
        assert_eq!(stored.len(), 3);
        for (i, p) in stored.iter().enumerate() {
            assert_eq!(p.chunk_index, i);
            assert_eq!(p.document_id, doc.document_id.to_string());
            assert_eq!(p.project_id, "proj-123");
            assert_eq!(p.tags, vec!["pdf"]);
        }
    }

    #[tokio::test]
    async fn test_rewriting_same_chunk_does_not_duplicate() {
        let store = InMemoryStore::new();
        let doc = DocumentMeta::new("doc.pdf", "p", vec![]);
        let writer = IndexWriter::new(&store);
        write_all(&writer, &doc, vec![embedded(0)]).await;
        let again = write_all(&writer, &doc, vec![embedded(0)]).await;

        assert_eq!(again.status(), IngestStatus::Failed);
        assert_eq!(again.failed_indices(), vec![0]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_report_from_out_of_order_outcomes_is_sorted() {
        let report = IngestReport::from_outcomes(
            Uuid::new_v4(),
            vec![
                (2, Ok(())),
                (1, Err(RagError::external("store", "down"))),
                (0, Ok(())),
            ],
        );
        assert_eq!(report.chunks, 3);
        assert_eq!(report.succeeded, vec![0, 2]);
        assert_eq!(report.failed_indices(), vec![1]);
        assert_eq!(report.failed[0].kind, "external_service_error");
        assert_eq!(report.status(), IngestStatus::Partial);
    }

    #[test]
    fn test_status_of_empty_report_is_success() {
        let report = IngestReport::new(Uuid::new_v4());
        assert_eq!(report.status(), IngestStatus::Success);
        assert_eq!(report.chunks, 0);
    }
}
