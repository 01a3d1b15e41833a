//! Process-wide collaborators, built once from configuration and shared by
//! the CLI commands and the HTTP server.

use std::sync::Arc;

use anyhow::Result;
use pdfrag_core::answer::{AnswerComposer, LanguageModel};
use pdfrag_core::chunk::ChunkingParams;
use pdfrag_core::embedding::Embedder;
use pdfrag_core::ingest::{IngestPipeline, PageLoader};
use pdfrag_core::retrieve::Retriever;
use pdfrag_core::store::memory::InMemoryStore;
use pdfrag_core::store::VectorStore;

use crate::config::{Config, StoreConfig};
use crate::embedding::create_embedder;
use crate::extract::PdfLoader;
use crate::llm::create_language_model;
use crate::weaviate::WeaviateStore;

/// Tunables that travel with the collaborators.
#[derive(Debug, Clone)]
pub struct Settings {
    pub chunking: ChunkingParams,
    pub default_top_k: usize,
    pub max_context_chars: usize,
    pub ingest_concurrency: usize,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunking: config.chunking.params(),
            default_top_k: config.retrieval.default_top_k,
            max_context_chars: config.retrieval.max_context_chars,
            ingest_concurrency: config.ingest.concurrency,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Immutable bundle of trait objects; cheap to clone.
#[derive(Clone)]
pub struct Services {
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub llm: Arc<dyn LanguageModel>,
    pub loader: Arc<dyn PageLoader>,
    pub settings: Settings,
}

impl Services {
    /// Construct every collaborator named by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let store = create_store(&config.store, embedder.dims())?;
        let llm = create_language_model(&config.llm)?;

        tracing::info!(
            embedder = embedder.model_name(),
            dims = embedder.dims(),
            store = store.name(),
            llm = llm.model_name(),
            "services ready"
        );

        Ok(Self {
            embedder,
            store,
            llm,
            loader: Arc::new(PdfLoader),
            settings: Settings::from_config(config),
        })
    }

    pub fn pipeline(&self) -> IngestPipeline<'_> {
        IngestPipeline::new(
            self.embedder.as_ref(),
            self.store.as_ref(),
            self.settings.chunking,
        )
        .with_concurrency(self.settings.ingest_concurrency)
    }

    pub fn retriever(&self) -> Retriever<'_> {
        Retriever::new(self.embedder.as_ref(), self.store.as_ref())
    }

    pub fn composer(&self) -> AnswerComposer<'_> {
        AnswerComposer::new(self.retriever(), self.llm.as_ref())
            .with_max_context_chars(self.settings.max_context_chars)
    }
}

pub fn create_store(config: &StoreConfig, dims: usize) -> Result<Arc<dyn VectorStore>> {
    match config.provider.as_str() {
        "weaviate" => Ok(Arc::new(WeaviateStore::new(config)?)),
        "memory" => Ok(Arc::new(InMemoryStore::with_dims(dims))),
        other => anyhow::bail!("Unknown store provider: {}", other),
    }
}

/// Create the collection schema when the configured store needs one.
///
/// Returns a human-readable status line.
pub async fn prepare_store(config: &StoreConfig) -> Result<String> {
    match config.provider.as_str() {
        "weaviate" => {
            let store = WeaviateStore::new(config)?;
            let created = store.ensure_collection().await?;
            Ok(if created {
                format!("Created collection '{}' at {}.", store.class(), config.url)
            } else {
                format!("Collection '{}' already exists at {}.", store.class(), config.url)
            })
        }
        _ => Ok(format!(
            "Store provider '{}' needs no initialization.",
            config.provider
        )),
    }
}
