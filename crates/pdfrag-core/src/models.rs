//! Core data types that flow through the ingestion and query pipelines.
//!
//! Ingestion: [`Page`] → [`PageChunk`] → [`EmbeddedChunk`] → [`ChunkRecord`].
//! Query: [`ChunkProperties`] (from the store) → [`RetrievedResult`] → [`Answer`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One page of extracted text, as produced by a [`PageLoader`](crate::ingest::PageLoader).
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based page number, if the loader knows it.
    pub number: Option<u32>,
    pub text: String,
}

impl Page {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number: Some(number),
            text: text.into(),
        }
    }
}

/// Document-level metadata attached to every chunk of one upload.
///
/// A document is immutable once ingested: superseding it means ingesting
/// again under a fresh `document_id`.
#[derive(Debug, Clone)]
pub struct DocumentMeta {
    pub document_id: Uuid,
    /// Original filename or URI of the upload.
    pub source_uri: String,
    pub project_id: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl DocumentMeta {
    /// Metadata for a new document with a freshly generated id.
    pub fn new(source_uri: impl Into<String>, project_id: impl Into<String>, tags: Vec<String>) -> Self {
        Self::with_id(Uuid::new_v4(), source_uri, project_id, tags)
    }

    /// Metadata under an existing id, used to resume a partial ingestion.
    pub fn with_id(
        document_id: Uuid,
        source_uri: impl Into<String>,
        project_id: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            document_id,
            source_uri: source_uri.into(),
            project_id: project_id.into(),
            tags,
            created_at: Utc::now(),
        }
    }
}

/// A contiguous span of text from one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageChunk {
    /// 0-based position within the document; contiguous across pages.
    pub chunk_index: usize,
    pub page_number: Option<u32>,
    pub content: String,
}

/// A chunk together with its embedding vector.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: PageChunk,
    pub vector: Vec<f32>,
}

/// Properties stored alongside each vector.
///
/// Field names are the vector-store property names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkProperties {
    pub document_id: String,
    pub source_uri: String,
    pub project_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub chunk_index: usize,
    pub page_number: Option<u32>,
    /// Ingestion time, RFC 3339 UTC.
    pub created_at: String,
    pub content: String,
}

/// One vector-store record: stable id, vector, properties.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub properties: ChunkProperties,
}

impl ChunkRecord {
    /// Builds the record for `embedded` under `doc`.
    ///
    /// The id is a UUID v5 of the chunk index in the document's namespace,
    /// so the same chunk of the same document always maps to the same record.
    pub fn new(doc: &DocumentMeta, embedded: EmbeddedChunk) -> Self {
        let EmbeddedChunk { chunk, vector } = embedded;
        Self {
            id: record_id(&doc.document_id, chunk.chunk_index),
            vector,
            properties: ChunkProperties {
                document_id: doc.document_id.to_string(),
                source_uri: doc.source_uri.clone(),
                project_id: doc.project_id.clone(),
                tags: doc.tags.clone(),
                chunk_index: chunk.chunk_index,
                page_number: chunk.page_number,
                created_at: doc.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                content: chunk.content,
            },
        }
    }
}

/// Stable record id for chunk `chunk_index` of `document_id`.
pub fn record_id(document_id: &Uuid, chunk_index: usize) -> Uuid {
    Uuid::new_v5(document_id, chunk_index.to_string().as_bytes())
}

/// A store hit: the record's properties plus an optional similarity score.
#[derive(Debug, Clone)]
pub struct StoreMatch {
    pub properties: ChunkProperties,
    /// Similarity in `[-1, 1]` when the store reports one.
    pub score: Option<f32>,
}

/// Read-only projection of a chunk returned to callers, best match first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedResult {
    pub content: String,
    pub source_uri: String,
    pub chunk_index: usize,
    pub page_number: Option<u32>,
    pub tags: Vec<String>,
    /// Position in the ranking, 0 = best.
    pub rank: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl RetrievedResult {
    pub fn from_match(rank: usize, m: StoreMatch) -> Self {
        let StoreMatch { properties, score } = m;
        Self {
            content: properties.content,
            source_uri: properties.source_uri,
            chunk_index: properties.chunk_index,
            page_number: properties.page_number,
            tags: properties.tags,
            rank,
            score,
        }
    }
}

/// Generated answer plus the number of chunks used as grounding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Number of results the retriever returned. Blocks dropped by the
    /// context budget still count, so this can exceed the number of blocks
    /// the model actually saw. Diagnostic only; not a quality signal.
    pub retrieved_count: usize,
}

/// Split a comma-separated tag string, trimming and dropping empties.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_is_stable() {
        let doc = Uuid::new_v4();
        assert_eq!(record_id(&doc, 3), record_id(&doc, 3));
        assert_ne!(record_id(&doc, 3), record_id(&doc, 4));
        assert_ne!(record_id(&doc, 3), record_id(&Uuid::new_v4(), 3));
    }

    #[test]
    fn test_chunk_record_carries_document_metadata() {
        let doc = DocumentMeta::new("doc.pdf", "proj-123", vec!["pdf".into(), "hr".into()]);
        let record = ChunkRecord::new(
            &doc,
            EmbeddedChunk {
                chunk: PageChunk {
                    chunk_index: 2,
                    page_number: Some(1),
                    content: "hello".into(),
                },
                vector: vec![0.1, 0.2],
            },
        );
        assert_eq!(record.id, record_id(&doc.document_id, 2));
        assert_eq!(record.properties.document_id, doc.document_id.to_string());
        assert_eq!(record.properties.source_uri, "doc.pdf");
        assert_eq!(record.properties.project_id, "proj-123");
        assert_eq!(record.properties.tags, vec!["pdf", "hr"]);
        assert_eq!(record.properties.page_number, Some(1));
        assert!(record.properties.created_at.ends_with('Z'));
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_tags("").is_empty());
        assert!(parse_tags(" , ").is_empty());
    }
}
