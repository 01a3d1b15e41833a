//! Vector-store abstraction.
//!
//! The [`VectorStore`] trait is the only contract the core has with the
//! database that owns chunk records, enabling pluggable backends (Weaviate
//! in the app crate, [`memory::InMemoryStore`] here for tests and local runs).
//!
//! Implementations must be `Send + Sync`; the store is the single shared
//! resource across concurrent requests and arbitrates concurrent writes
//! itself.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`insert`](VectorStore::insert) | Insert one record; rejects an id that already exists |
//! | [`near_vector`](VectorStore::near_vector) | Filtered nearest-neighbour search, best first |

pub mod memory;

use async_trait::async_trait;

use crate::error::RagResult;
use crate::filter::Filter;
use crate::models::{ChunkRecord, StoreMatch};

/// Property names every record carries, in schema order.
pub const RECORD_PROPERTIES: [&str; 8] = [
    "document_id",
    "source_uri",
    "project_id",
    "tags",
    "chunk_index",
    "page_number",
    "created_at",
    "content",
];

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name used in error messages (e.g. `"weaviate"`).
    fn name(&self) -> &str;

    /// Insert one record.
    ///
    /// Either the record is fully stored or an error is returned. A record
    /// whose id already exists must be rejected, never stored twice.
    async fn insert(&self, record: ChunkRecord) -> RagResult<()>;

    /// Return up to `limit` records nearest to `vector` among those passing
    /// `filter`, ordered best match first.
    ///
    /// A filter the backend cannot apply is a
    /// [`RagError::Query`](crate::error::RagError::Query); implementations
    /// must not fall back to an unfiltered search.
    async fn near_vector(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&Filter>,
    ) -> RagResult<Vec<StoreMatch>>;
}
