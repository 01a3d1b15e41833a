//! # pdfrag core
//!
//! Runtime-agnostic retrieval-augmented generation pipeline: chunking,
//! embedder trait, metadata filters, vector-store trait, index writing,
//! retrieval and grounded answer composition.
//!
//! Every external collaborator (text extraction, embedding model, vector
//! database, language model) sits behind a trait and is injected by the
//! caller. This crate contains no tokio, HTTP or filesystem I/O.
//!
//! ```text
//! ingest: Page ─▶ chunk ─▶ Embedder ─▶ IndexWriter ─▶ VectorStore
//! query:  question ─▶ Embedder ─▶ Retriever ─▶ AnswerComposer ─▶ LanguageModel
//! ```

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod index;
pub mod ingest;
pub mod models;
pub mod retrieve;
pub mod store;

pub use error::{RagError, RagResult};
