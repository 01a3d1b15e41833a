//! Embedding providers implementing [`pdfrag_core::embedding::Embedder`].
//!
//! - **[`OpenAIEmbedder`]** calls an OpenAI-compatible `POST /embeddings` endpoint.
//! - **[`OllamaEmbedder`]** calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`LocalEmbedder`]** runs models in-process via fastembed; no network
//!   calls after the model download.
//!
//! Remote providers retry transient failures with exponential backoff (see
//! [`crate::http`]). Any failure surfaces as
//! [`RagError::ExternalService`]; a malformed response is never turned into
//! a zero vector.
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the provider named by
//! `[embedding].provider`.

use std::sync::Arc;
#[cfg(feature = "local-embeddings-fastembed")]
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use pdfrag_core::embedding::Embedder;
use pdfrag_core::{RagError, RagResult};
use serde_json::Value;

use crate::config::EmbeddingConfig;
use crate::http;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI embeddings API (or a compatible one).
///
/// Reads the API key from the environment variable named by
/// `[embedding].api_key_env` (default `OPENAI_API_KEY`).
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!("{} environment variable not set", config.api_key_env)
        })?;
        let base = config.url.as_deref().unwrap_or(OPENAI_DEFAULT_URL);

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: format!("{}/embeddings", base.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let json = http::post_json_with_retry(
            &self.client,
            &self.url,
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await
        .map_err(|e| e.into_external("openai embeddings"))?;

        first_vector(parse_openai_response(&json)?, "openai embeddings")
    }
}

/// Extract `data[].embedding` arrays, in `index` order.
fn parse_openai_response(json: &Value) -> RagResult<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| invalid("openai embeddings", "missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| invalid("openai embeddings", "missing embedding"))?;
        indexed.push((index, to_vector(embedding, "openai embeddings")?));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on `[embedding].url` (default `http://localhost:11434`).
/// Requires the model to be pulled (e.g. `ollama pull all-minilm`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let base = config.url.as_deref().unwrap_or(OLLAMA_DEFAULT_URL);

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: format!("{}/api/embed", base.trim_end_matches('/')),
            model: config.model.clone(),
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let json = http::post_json_with_retry(&self.client, &self.url, None, &body, self.max_retries)
            .await
            .map_err(|e| {
                RagError::external(
                    "ollama embeddings",
                    format!("{} (is Ollama running at {}?)", e, self.url),
                )
            })?;

        first_vector(parse_ollama_response(&json)?, "ollama embeddings")
    }
}

fn parse_ollama_response(json: &Value) -> RagResult<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| invalid("ollama embeddings", "missing embeddings array"))?
        .iter()
        .map(|e| to_vector(e, "ollama embeddings"))
        .collect()
}

// ============ Local Provider (fastembed) ============

/// In-process embedding with fastembed.
///
/// The model is downloaded from Hugging Face on first use and cached; it is
/// loaded once per process and shared by every request.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    kind: fastembed::EmbeddingModel,
    model: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
    /// Per-call bound, including the first call's model download.
    timeout: Duration,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = normalize_local_model(&config.model);
        let kind = fastembed_model(&model_name)?;
        let dims = match config.dims {
            Some(d) => d,
            None => local_model_dims(&model_name)?,
        };
        Ok(Self {
            model_name,
            dims,
            kind,
            model: Arc::new(std::sync::Mutex::new(None)),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        let model = self.model.clone();
        let kind = self.kind.clone();
        let text = text.to_string();

        let handle = tokio::task::spawn_blocking(move || -> RagResult<Vec<Vec<f32>>> {
            let mut guard = model
                .lock()
                .map_err(|_| RagError::external("local embeddings", "model lock poisoned"))?;
            if guard.is_none() {
                let loaded = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(kind).with_show_download_progress(false),
                )
                .map_err(|e| {
                    RagError::external(
                        "local embeddings",
                        format!("failed to initialize model: {}", e),
                    )
                })?;
                *guard = Some(loaded);
            }
            let model = guard
                .as_mut()
                .ok_or_else(|| RagError::external("local embeddings", "model not loaded"))?;
            model
                .embed(vec![text], None)
                .map_err(|e| RagError::external("local embeddings", e.to_string()))
        });
        let embeddings = http::bounded("local embeddings", self.timeout, async {
            handle
                .await
                .map_err(|e| RagError::external("local embeddings", e.to_string()))?
        })
        .await?;

        first_vector(embeddings, "local embeddings")
    }
}

/// Accept both fastembed ids and Hugging Face names
/// (`sentence-transformers/all-MiniLM-L6-v2` → `all-minilm-l6-v2`).
pub fn normalize_local_model(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    let bare = lower.rsplit('/').next().unwrap_or(&lower);
    bare.to_string()
}

/// Output size of the supported local models.
pub fn local_model_dims(name: &str) -> Result<usize> {
    Ok(match name {
        "all-minilm-l6-v2" | "bge-small-en-v1.5" | "multilingual-e5-small" => 384,
        "bge-base-en-v1.5" | "nomic-embed-text-v1" | "nomic-embed-text-v1.5"
        | "multilingual-e5-base" => 768,
        "bge-large-en-v1.5" | "multilingual-e5-large" => 1024,
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ),
    })
}

#[cfg(feature = "local-embeddings-fastembed")]
fn fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    // Validates the name and its dimensions in one place.
    local_model_dims(name)?;
    Ok(match name {
        "all-minilm-l6-v2" => fastembed::EmbeddingModel::AllMiniLML6V2,
        "bge-small-en-v1.5" => fastembed::EmbeddingModel::BGESmallENV15,
        "bge-base-en-v1.5" => fastembed::EmbeddingModel::BGEBaseENV15,
        "bge-large-en-v1.5" => fastembed::EmbeddingModel::BGELargeENV15,
        "nomic-embed-text-v1" => fastembed::EmbeddingModel::NomicEmbedTextV1,
        "nomic-embed-text-v1.5" => fastembed::EmbeddingModel::NomicEmbedTextV15,
        "multilingual-e5-small" => fastembed::EmbeddingModel::MultilingualE5Small,
        "multilingual-e5-base" => fastembed::EmbeddingModel::MultilingualE5Base,
        _ => fastembed::EmbeddingModel::MultilingualE5Large,
    })
}

// ============ Helpers ============

fn invalid(service: &str, detail: &str) -> RagError {
    RagError::external(service, format!("invalid response: {}", detail))
}

fn to_vector(value: &Value, service: &str) -> RagResult<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| invalid(service, "embedding is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| invalid(service, "embedding contains a non-number"))
        })
        .collect()
}

fn first_vector(vectors: Vec<Vec<f32>>, service: &str) -> RagResult<Vec<f32>> {
    vectors
        .into_iter()
        .next()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| invalid(service, "empty embedding"))
}

/// Create the [`Embedder`] named by `[embedding].provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"local"` | [`LocalEmbedder`] (feature `local-embeddings-fastembed`) |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!(
            "Local embedding provider requires --features local-embeddings-fastembed"
        ),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
