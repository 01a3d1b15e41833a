//! Outbound HTTP plumbing shared by the embedding, vector-store and
//! language-model adapters.
//!
//! # Retry Strategy
//!
//! [`post_json_with_retry`] is used for idempotent reads only (embedding
//! and vector queries):
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use pdfrag_core::RagError;
use reqwest::StatusCode;
use serde_json::Value;

/// Build a client whose every request is bounded by `timeout_secs`.
pub(crate) fn client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Delay before retry number `attempt` (1-based).
pub(crate) fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// Why an outbound call failed.
#[derive(Debug)]
pub(crate) enum CallError {
    /// The server answered with a non-success status.
    Status { status: StatusCode, body: String },
    /// Connection failure, timeout or undecodable body.
    Transport(reqwest::Error),
}

impl CallError {
    pub(crate) fn status(&self) -> Option<StatusCode> {
        match self {
            CallError::Status { status, .. } => Some(*status),
            CallError::Transport(_) => None,
        }
    }

    /// `ExternalService` error attributed to `service`.
    pub(crate) fn into_external(self, service: &str) -> RagError {
        RagError::external(service, self.to_string())
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::Status { status, body } => write!(f, "HTTP {}: {}", status, body),
            CallError::Transport(e) if e.is_timeout() => write!(f, "request timed out: {}", e),
            CallError::Transport(e) => write!(f, "{}", e),
        }
    }
}

/// Await `work`, failing with an `ExternalService` error for `service`
/// once `limit` has elapsed.
pub(crate) async fn bounded<T>(
    service: &str,
    limit: Duration,
    work: impl std::future::Future<Output = Result<T, RagError>>,
) -> Result<T, RagError> {
    tokio::time::timeout(limit, work).await.map_err(|_| {
        RagError::external(service, format!("timed out after {}s", limit.as_secs()))
    })?
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// POST `body` to `url` once and decode the JSON response.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &Value,
) -> Result<Value, CallError> {
    let mut req = client.post(url).json(body);
    if let Some(token) = bearer {
        req = req.bearer_auth(token);
    }
    let response = req.send().await.map_err(CallError::Transport)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CallError::Status { status, body });
    }
    response.json().await.map_err(CallError::Transport)
}

/// [`post_json`] with exponential backoff on transient failures.
pub(crate) async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &Value,
    max_retries: u32,
) -> Result<Value, CallError> {
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            tokio::time::sleep(backoff(attempt)).await;
        }
        match post_json(client, url, bearer, body).await {
            Ok(json) => return Ok(json),
            Err(e) => {
                let transient = match &e {
                    CallError::Status { status, .. } => is_retryable(*status),
                    CallError::Transport(_) => true,
                };
                if !transient || attempt >= max_retries {
                    return Err(e);
                }
                tracing::debug!(url, attempt, error = %e, "transient failure, retrying");
            }
        }
        attempt += 1;
    }
}
