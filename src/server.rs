//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/upload-pdf` | Multipart upload: `file`, `project_id` (default `proj-123`), `tags` (comma-separated, default `pdf`) |
//! | `POST` | `/chat` | `{question, top_k?, project_id?, tags?}` → `{answer, retrieved_docs}` |
//! | `POST` | `/search` | Same body as `/chat` → `{results}`, no generation |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "kind": "validation_error", "message": "question must not be empty" } }
//! ```
//!
//! | kind | status |
//! |------|--------|
//! | `validation_error` | 400 |
//! | `query_error` | 500 |
//! | `generation_error` | 502 |
//! | `external_service_error` | 503 |
//! | `integration_mismatch` | 500 |
//!
//! An upload where no chunk could be indexed also returns the per-chunk
//! report under `"report"`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pdfrag_core::index::{ChunkFailure, IngestReport, IngestStatus};
use pdfrag_core::models::{parse_tags, DocumentMeta, RetrievedResult};
use pdfrag_core::RagError;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::Config;
use crate::services::{prepare_store, Services};

pub const DEFAULT_PROJECT_ID: &str = "proj-123";
pub const DEFAULT_TAGS: &str = "pdf";

/// Largest accepted request body.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Starts the server on `[server].bind`, creating the collection first if
/// the store needs one. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Services::from_config(config)?;
    let status = prepare_store(&config.store).await?;
    tracing::info!("{}", status);
    run_server_with_services(&config.server.bind, Arc::new(services)).await
}

/// Starts the server with pre-built collaborators.
pub async fn run_server_with_services(bind: &str, services: Arc<Services>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("pdfrag server listening on http://{}", bind);
    axum::serve(listener, router(services)).await?;
    Ok(())
}

pub fn router(services: Arc<Services>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/upload-pdf", post(handle_upload))
        .route("/chat", post(handle_chat))
        .route("/search", post(handle_search))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(services)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<UploadResponse>,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Stable error kind, see [`RagError::kind`].
    kind: String,
    message: String,
}

/// A [`RagError`] on its way to becoming an HTTP response.
struct AppError {
    status: StatusCode,
    kind: String,
    message: String,
    report: Option<UploadResponse>,
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        AppError {
            status: status_for_kind(err.kind()),
            kind: err.kind().to_string(),
            message: err.to_string(),
            report: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(kind = %self.kind, "{}", self.message);
        }
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind,
                message: self.message,
            },
            report: self.report,
        };
        (self.status, Json(body)).into_response()
    }
}

fn status_for_kind(kind: &str) -> StatusCode {
    match kind {
        "validation_error" => StatusCode::BAD_REQUEST,
        "generation_error" => StatusCode::BAD_GATEWAY,
        "external_service_error" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /upload-pdf ============

#[derive(Serialize)]
struct UploadResponse {
    status: IngestStatus,
    uploaded_file: String,
    document_id: Uuid,
    chunks: usize,
    succeeded: Vec<usize>,
    failed: Vec<ChunkFailure>,
}

impl UploadResponse {
    fn new(uploaded_file: String, report: IngestReport) -> Self {
        Self {
            status: report.status(),
            uploaded_file,
            document_id: report.document_id,
            chunks: report.chunks,
            succeeded: report.succeeded,
            failed: report.failed,
        }
    }
}

fn multipart_error(e: impl std::fmt::Display) -> AppError {
    RagError::validation(format!("invalid multipart body: {}", e)).into()
}

/// Handler for `POST /upload-pdf`.
///
/// A partially indexed document is still a 200 with `status: "partial"`;
/// the failed chunk indices can be re-ingested under the returned
/// `document_id`.
async fn handle_upload(
    State(services): State<Arc<Services>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut project_id = DEFAULT_PROJECT_ID.to_string();
    let mut tags = DEFAULT_TAGS.to_string();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload.pdf").to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((filename, bytes.to_vec()));
            }
            "project_id" => {
                let value = field.text().await.map_err(multipart_error)?;
                if !value.trim().is_empty() {
                    project_id = value.trim().to_string();
                }
            }
            "tags" => tags = field.text().await.map_err(multipart_error)?,
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| RagError::validation("multipart field 'file' is required"))?;
    if bytes.is_empty() {
        return Err(RagError::validation("uploaded file is empty").into());
    }

    let doc = DocumentMeta::new(filename.clone(), project_id, parse_tags(&tags));
    let loader = services.loader.clone();
    let pages = tokio::task::spawn_blocking(move || loader.load_pages(&bytes))
        .await
        .map_err(|e| RagError::validation(format!("PDF extraction failed: {}", e)))??;

    let report = services.pipeline().ingest_pages(&doc, &pages, None).await?;
    let status = report.status();
    let first_failure = report.failed.first().cloned();
    let response = UploadResponse::new(filename, report);

    match (status, first_failure) {
        (IngestStatus::Failed, Some(failure)) => Err(AppError {
            status: status_for_kind(&failure.kind),
            kind: failure.kind,
            message: format!("no chunks were indexed: {}", failure.message),
            report: Some(response),
        }),
        _ => Ok(Json(response)),
    }
}

// ============ POST /chat, POST /search ============

/// Tags as a comma-separated string or a JSON list.
#[derive(Deserialize)]
#[serde(untagged)]
enum TagsInput {
    Csv(String),
    List(Vec<String>),
}

impl TagsInput {
    fn into_tags(self) -> Vec<String> {
        match self {
            TagsInput::Csv(raw) => parse_tags(&raw),
            TagsInput::List(list) => list
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    #[serde(default)]
    top_k: Option<i64>,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    tags: Option<TagsInput>,
}

/// Validated query parameters.
struct Query {
    question: String,
    top_k: usize,
    project_id: Option<String>,
    tags: Option<Vec<String>>,
}

impl Query {
    fn from_request(
        payload: Result<Json<QueryRequest>, JsonRejection>,
        default_top_k: usize,
    ) -> Result<Self, RagError> {
        let Json(req) = payload.map_err(|e| RagError::validation(e.body_text()))?;
        let top_k = match req.top_k {
            None => default_top_k,
            Some(k) if k < 1 => return Err(RagError::validation("top_k must be >= 1")),
            Some(k) => k as usize,
        };
        Ok(Self {
            question: req.question,
            top_k,
            project_id: req.project_id,
            tags: req.tags.map(TagsInput::into_tags).filter(|t| !t.is_empty()),
        })
    }
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    /// Number of chunks used as grounding context.
    retrieved_docs: usize,
}

async fn handle_chat(
    State(services): State<Arc<Services>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let q = Query::from_request(payload, services.settings.default_top_k)?;
    let answer = services
        .composer()
        .answer(
            &q.question,
            q.top_k,
            q.project_id.as_deref(),
            q.tags.as_deref(),
        )
        .await?;

    Ok(Json(ChatResponse {
        answer: answer.text,
        retrieved_docs: answer.retrieved_count,
    }))
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<RetrievedResult>,
}

async fn handle_search(
    State(services): State<Arc<Services>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let q = Query::from_request(payload, services.settings.default_top_k)?;
    let results = services
        .retriever()
        .retrieve(
            &q.question,
            q.top_k,
            q.project_id.as_deref(),
            q.tags.as_deref(),
        )
        .await?;
    Ok(Json(SearchResponse { results }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for_kind("validation_error"), StatusCode::BAD_REQUEST);
        assert_eq!(status_for_kind("query_error"), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for_kind("generation_error"), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for_kind("external_service_error"),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for_kind("integration_mismatch"),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_tags_input_forms() {
        let csv: TagsInput = serde_json::from_str("\"hr, policy,\"").unwrap();
        assert_eq!(csv.into_tags(), vec!["hr", "policy"]);
        let list: TagsInput = serde_json::from_str("[\" hr \", \"\"]").unwrap();
        assert_eq!(list.into_tags(), vec!["hr"]);
    }
}
