//! TOML configuration parsing, environment overrides and validation.
//!
//! Every section is optional and falls back to the defaults below, so an
//! empty file (or no file at all when the default path is used) yields a
//! working local setup.
//!
//! ```toml
//! [chunking]
//! chunk_size = 500
//! chunk_overlap = 100
//!
//! [retrieval]
//! default_top_k = 3
//! max_context_chars = 12000
//!
//! [ingest]
//! concurrency = 4
//!
//! [embedding]
//! provider = "local"          # local | openai | ollama
//! model = "all-minilm-l6-v2"
//!
//! [store]
//! provider = "weaviate"       # weaviate | memory
//! url = "http://localhost:8080"
//! collection = "newlearn"
//!
//! [llm]
//! provider = "openai"         # openai | ollama | disabled
//! base_url = "https://api.groq.com/openai/v1"
//! model = "gemma2-9b-it"
//! api_key_env = "GROQ_API_KEY"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```
//!
//! After parsing, these environment variables override the file:
//! `EMBED_MODEL`, `WEAVIATE_CLASS`, `WEAVIATE_URL`, `CHUNK_SIZE`,
//! `CHUNK_OVERLAP`, `DEFAULT_TOP_K`, `PDFRAG_BIND`.

use anyhow::{bail, Context, Result};
use pdfrag_core::chunk::ChunkingParams;
use serde::Deserialize;
use std::path::Path;

/// Used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/pdfrag.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkingParams {
        ChunkingParams {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_max_context_chars() -> usize {
    12_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Chunks embedded and inserted concurrently per document.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Required for `openai` and `ollama`; `local` derives it from the model.
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama server, or an OpenAI-compatible endpoint).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: None,
            url: None,
            api_key_env: default_embedding_key_env(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_embedding_model() -> String {
    "all-minilm-l6-v2".to_string()
}
fn default_embedding_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_provider")]
    pub provider: String,
    #[serde(default = "default_store_url")]
    pub url: String,
    /// Weaviate class holding the chunk records.
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Name of the environment variable holding the API key, if any.
    #[serde(default = "default_store_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries for queries only; inserts are never retried.
    #[serde(default = "default_store_retries")]
    pub max_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: default_store_provider(),
            url: default_store_url(),
            collection: default_collection(),
            api_key_env: default_store_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_store_retries(),
        }
    }
}

fn default_store_provider() -> String {
    "weaviate".to_string()
}
fn default_store_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_collection() -> String {
    "newlearn".to_string()
}
fn default_store_key_env() -> String {
    "WEAVIATE_API_KEY".to_string()
}
fn default_store_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key_env: default_llm_key_env(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_llm_model() -> String {
    "gemma2-9b-it".to_string()
}
fn default_llm_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// Load configuration for the CLI.
///
/// With an explicit path the file must exist. Without one,
/// [`DEFAULT_CONFIG_PATH`] is used if present and built-in defaults
/// otherwise. Environment overrides and validation apply in both cases.
pub fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                load_config(default)
            } else {
                finish(Config::default())
            }
        }
    }
}

/// Read, parse, override from the environment and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    finish(config)
}

fn finish(mut config: Config) -> Result<Config> {
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Apply the supported environment overrides, reading variables via `lookup`.
pub fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(model) = get("EMBED_MODEL") {
        config.embedding.model = model;
    }
    if let Some(class) = get("WEAVIATE_CLASS") {
        config.store.collection = class;
    }
    if let Some(url) = get("WEAVIATE_URL") {
        config.store.url = url;
    }
    if let Some(bind) = get("PDFRAG_BIND") {
        config.server.bind = bind;
    }
    if let Some(v) = get("CHUNK_SIZE") {
        config.chunking.chunk_size = parse_number("CHUNK_SIZE", &v)?;
    }
    if let Some(v) = get("CHUNK_OVERLAP") {
        config.chunking.chunk_overlap = parse_number("CHUNK_OVERLAP", &v)?;
    }
    if let Some(v) = get("DEFAULT_TOP_K") {
        config.retrieval.default_top_k = parse_number("DEFAULT_TOP_K", &v)?;
    }
    Ok(())
}

fn parse_number(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a non-negative integer, got '{}'", key, value))
}

pub fn validate(config: &Config) -> Result<()> {
    // Chunking
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!(
            "chunking.chunk_overlap ({}) must be < chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    // Retrieval
    if config.retrieval.default_top_k < 1 {
        bail!("retrieval.default_top_k must be >= 1");
    }
    if config.retrieval.max_context_chars == 0 {
        bail!("retrieval.max_context_chars must be > 0");
    }

    if config.ingest.concurrency < 1 {
        bail!("ingest.concurrency must be >= 1");
    }

    // Embedding
    match config.embedding.provider.as_str() {
        "local" => {}
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() {
                bail!(
                    "embedding.dims must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, or ollama.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.model.trim().is_empty() {
        bail!("embedding.model must not be empty");
    }

    // Store
    match config.store.provider.as_str() {
        "weaviate" | "memory" => {}
        other => bail!(
            "Unknown store provider: '{}'. Must be weaviate or memory.",
            other
        ),
    }
    if config.store.collection.trim().is_empty() {
        bail!("store.collection must not be empty");
    }

    // Language model
    match config.llm.provider.as_str() {
        "openai" | "ollama" | "disabled" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be openai, ollama, or disabled.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.retrieval.default_top_k, 3);
        assert_eq!(config.retrieval.max_context_chars, 12_000);
        assert_eq!(config.ingest.concurrency, 4);
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.store.collection, "newlearn");
        assert_eq!(config.llm.model, "gemma2-9b-it");
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        validate(&config).unwrap();
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
[chunking]
chunk_size = 800

[store]
provider = "memory"
"#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.store.provider, "memory");
        assert_eq!(config.store.url, "http://localhost:8080");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        let vars = env(&[
            ("EMBED_MODEL", "bge-small-en-v1.5"),
            ("WEAVIATE_CLASS", "Handbooks"),
            ("WEAVIATE_URL", "http://weaviate:8080"),
            ("CHUNK_SIZE", "1000"),
            ("CHUNK_OVERLAP", "200"),
            ("DEFAULT_TOP_K", "5"),
            ("PDFRAG_BIND", "0.0.0.0:9000"),
        ]);
        apply_env_overrides(&mut config, |k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.embedding.model, "bge-small-en-v1.5");
        assert_eq!(config.store.collection, "Handbooks");
        assert_eq!(config.store.url, "http://weaviate:8080");
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.default_top_k, 5);
        assert_eq!(config.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_blank_env_value_is_ignored() {
        let mut config = Config::default();
        let vars = env(&[("WEAVIATE_CLASS", "  ")]);
        apply_env_overrides(&mut config, |k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.store.collection, "newlearn");
    }

    #[test]
    fn test_non_numeric_env_value_errors() {
        let mut config = Config::default();
        let vars = env(&[("CHUNK_SIZE", "big")]);
        let err = apply_env_overrides(&mut config, |k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("CHUNK_SIZE"));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = Config::default();
        config.chunking.chunk_overlap = 500;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let mut config = Config::default();
        config.retrieval.default_top_k = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_remote_embedding_requires_dims() {
        let mut config = Config::default();
        config.embedding.provider = "openai".into();
        assert!(validate(&config).is_err());
        config.embedding.dims = Some(1536);
        validate(&config).unwrap();
    }

    #[test]
    fn test_unknown_providers_rejected() {
        let mut config = Config::default();
        config.store.provider = "pinecone".into();
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.llm.provider = "bard".into();
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.embedding.provider = "disabled".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("pdfrag.toml");
        std::fs::write(
            &path,
            r#"
[retrieval]
default_top_k = 4

[llm]
provider = "disabled"
"#,
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.retrieval.default_top_k, 4);
        assert_eq!(config.llm.provider, "disabled");
    }

    #[test]
    fn test_load_config_missing_file_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = load_config(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_config_invalid_values_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("pdfrag.toml");
        std::fs::write(&path, "[chunking]\nchunk_size = 0\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let example: Config =
            toml::from_str(include_str!("../config/pdfrag.example.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(example.chunking.params(), defaults.chunking.params());
        assert_eq!(example.embedding.model, defaults.embedding.model);
        assert_eq!(example.store.url, defaults.store.url);
        assert_eq!(example.llm.base_url, defaults.llm.base_url);
        assert_eq!(example.server.bind, defaults.server.bind);
        validate(&example).unwrap();
    }
}
