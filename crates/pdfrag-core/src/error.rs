//! Error taxonomy shared by every pipeline component.
//!
//! Each variant maps to a stable, machine-readable kind (see
//! [`RagError::kind`]) that the HTTP layer returns verbatim, so clients can
//! branch on the failure class without parsing messages.

/// Result alias used throughout the core.
pub type RagResult<T> = Result<T, RagError>;

/// Failure of a single ingestion or query request.
///
/// Nothing here is fatal to the process; every error is scoped to the
/// request that produced it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RagError {
    /// Malformed request: missing file, blank question, bad `top_k`, bad config.
    #[error("validation error: {0}")]
    Validation(String),

    /// Embedding model or vector store unreachable, erroring, or timed out.
    #[error("{service} error: {message}")]
    ExternalService { service: String, message: String },

    /// A metadata filter could not be constructed or applied.
    #[error("filters could not be applied: {0}")]
    Query(String),

    /// The language model invocation failed.
    #[error("generation failed: {0}")]
    Generation(String),

    /// A known API-shape incompatibility between this code and a dependency.
    #[error("{dependency} integration mismatch: {detail}")]
    IntegrationMismatch { dependency: String, detail: String },
}

impl RagError {
    pub fn validation(message: impl Into<String>) -> Self {
        RagError::Validation(message.into())
    }

    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        RagError::Query(message.into())
    }

    pub fn generation(message: impl Into<String>) -> Self {
        RagError::Generation(message.into())
    }

    pub fn mismatch(dependency: impl Into<String>, detail: impl Into<String>) -> Self {
        RagError::IntegrationMismatch {
            dependency: dependency.into(),
            detail: detail.into(),
        }
    }

    /// Stable error kind, e.g. `"query_error"`.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::Validation(_) => "validation_error",
            RagError::ExternalService { .. } => "external_service_error",
            RagError::Query(_) => "query_error",
            RagError::Generation(_) => "generation_error",
            RagError::IntegrationMismatch { .. } => "integration_mismatch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_stable() {
        assert_eq!(RagError::validation("x").kind(), "validation_error");
        assert_eq!(RagError::external("weaviate", "x").kind(), "external_service_error");
        assert_eq!(RagError::query("x").kind(), "query_error");
        assert_eq!(RagError::generation("x").kind(), "generation_error");
        assert_eq!(RagError::mismatch("weaviate", "x").kind(), "integration_mismatch");
    }

    #[test]
    fn test_display_names_the_service() {
        let err = RagError::external("embedding", "connection refused");
        assert_eq!(err.to_string(), "embedding error: connection refused");
    }
}
