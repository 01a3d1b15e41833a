//! # pdfrag
//!
//! Question answering over uploaded PDFs.
//!
//! pdfrag extracts page text from a PDF, splits it into overlapping chunks,
//! embeds each chunk, and writes it with its metadata into a vector store.
//! Questions are embedded the same way, the nearest chunks are retrieved
//! (optionally filtered by project and tags), and a language model answers
//! from that context only.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │   PDF    │──▶│ Chunk+Embed  │──▶│ Weaviate │
//! │ extract  │   │ (pdfrag-core)│   │  class   │
//! └──────────┘   └──────────────┘   └────┬─────┘
//!                                        │
//!                    ┌───────────────────┤
//!                    ▼                   ▼
//!               ┌──────────┐       ┌──────────┐
//!               │   CLI    │       │   HTTP   │
//!               │ (pdfrag) │       │  (axum)  │
//!               └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pdfrag init                                   # create the collection
//! pdfrag ingest handbook.pdf --tags hr,policy   # index a PDF
//! pdfrag ask "How many vacation days do I get?"
//! pdfrag serve                                  # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration, env overrides, validation |
//! | [`embedding`] | OpenAI, Ollama and local fastembed embedders |
//! | [`extract`] | PDF → per-page text |
//! | [`llm`] | Chat-completion language models |
//! | [`weaviate`] | Weaviate vector store over REST + GraphQL |
//! | [`services`] | Collaborators built from config |
//! | [`server`] | HTTP server |
//! | [`ingest`], [`search`], [`ask`] | CLI commands |

pub mod ask;
pub mod config;
pub mod embedding;
pub mod extract;
mod http;
pub mod ingest;
pub mod llm;
pub mod search;
pub mod server;
pub mod services;
pub mod weaviate;
