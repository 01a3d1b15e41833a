//! Embedder trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement.
//! Concrete providers (OpenAI, Ollama, fastembed) live in the `pdfrag` app
//! crate; tests substitute deterministic stubs.
//!
//! The same embedder instance must serve both ingestion and queries so that
//! stored and query vectors are comparable.

use async_trait::async_trait;

use crate::error::{RagError, RagResult};

/// Text → fixed-dimension vector.
///
/// Implementations must be deterministic: identical text yields the
/// identical vector, within the floating-point reproducibility of the model.
/// An unavailable model is an [`RagError::ExternalService`]; implementations
/// never substitute a zero vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;

    /// Embed one text.
    async fn embed(&self, text: &str) -> RagResult<Vec<f32>>;
}

/// Embed `text` and verify the vector has `embedder.dims()` components.
pub async fn embed_checked(embedder: &dyn Embedder, text: &str) -> RagResult<Vec<f32>> {
    let vector = embedder.embed(text).await?;
    if vector.len() != embedder.dims() {
        return Err(RagError::external(
            "embedding",
            format!(
                "model '{}' returned {} dimensions, expected {}",
                embedder.model_name(),
                vector.len(),
                embedder.dims()
            ),
        ));
    }
    Ok(vector)
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
