//! Ingestion pipeline: pages → chunks → vectors → records.
//!
//! Coordinates the [`chunk`](crate::chunk) policy, an [`Embedder`] and the
//! [`IndexWriter`] for one document. Up to `concurrency` chunks are embedded
//! and inserted at once; a failure in either step is recorded against that
//! chunk and never aborts its siblings.

use std::collections::BTreeSet;

use futures::stream::{self, StreamExt};

use crate::chunk::{chunk_pages, ChunkingParams};
use crate::embedding::{embed_checked, Embedder};
use crate::error::{RagError, RagResult};
use crate::index::{IndexWriter, IngestReport};
use crate::models::{DocumentMeta, EmbeddedChunk, Page};
use crate::store::VectorStore;

/// Black-box text extraction: file bytes → page-tagged text.
pub trait PageLoader: Send + Sync {
    /// Extract pages in document order. Unreadable input is a
    /// [`RagError::Validation`].
    fn load_pages(&self, bytes: &[u8]) -> RagResult<Vec<Page>>;
}

/// Ingests documents with injected collaborators.
pub struct IngestPipeline<'a> {
    embedder: &'a dyn Embedder,
    store: &'a dyn VectorStore,
    chunking: ChunkingParams,
    concurrency: usize,
}

impl<'a> IngestPipeline<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        store: &'a dyn VectorStore,
        chunking: ChunkingParams,
    ) -> Self {
        Self {
            embedder,
            store,
            chunking,
            concurrency: 1,
        }
    }

    /// Number of chunks embedded and inserted concurrently (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Extract `bytes` with `loader` and ingest the resulting pages.
    pub async fn ingest_bytes(
        &self,
        loader: &dyn PageLoader,
        bytes: &[u8],
        doc: &DocumentMeta,
        only: Option<&BTreeSet<usize>>,
    ) -> RagResult<IngestReport> {
        if bytes.is_empty() {
            return Err(RagError::validation("uploaded file is empty"));
        }
        let pages = loader.load_pages(bytes)?;
        self.ingest_pages(doc, &pages, only).await
    }

    /// Chunk, embed and index `pages` under `doc`.
    ///
    /// With `only`, just the listed chunk indices are processed. Chunking is
    /// deterministic and record ids derive from `(document_id, chunk_index)`,
    /// so re-running the failed indices of a report under the same document
    /// id resumes the ingestion without duplicating records.
    ///
    /// Errors only for invalid chunking parameters; per-chunk failures are
    /// reported in the returned [`IngestReport`].
    pub async fn ingest_pages(
        &self,
        doc: &DocumentMeta,
        pages: &[Page],
        only: Option<&BTreeSet<usize>>,
    ) -> RagResult<IngestReport> {
        let mut chunks = chunk_pages(pages, &self.chunking)?;
        if let Some(only) = only {
            chunks.retain(|c| only.contains(&c.chunk_index));
        }

        let writer = IndexWriter::new(self.store);
        let writer = &writer;
        let embedder = self.embedder;

        let outcomes: Vec<(usize, RagResult<()>)> = stream::iter(chunks)
            .map(move |chunk| async move {
                let index = chunk.chunk_index;
                let outcome = match embed_checked(embedder, &chunk.content).await {
                    Ok(vector) => writer.write_one(doc, EmbeddedChunk { chunk, vector }).await,
                    Err(e) => Err(e),
                };
                (index, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let report = IngestReport::from_outcomes(doc.document_id, outcomes);

        tracing::info!(
            document_id = %doc.document_id,
            source_uri = %doc.source_uri,
            project_id = %doc.project_id,
            chunks = report.chunks,
            failed = report.failed.len(),
            "document ingested"
        );
        Ok(report)
    }
}
