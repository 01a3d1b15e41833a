//! Chat-completion adapters implementing
//! [`pdfrag_core::answer::LanguageModel`].
//!
//! - **[`OpenAIChat`]**: any OpenAI-compatible `/chat/completions` endpoint
//!   (Groq by default).
//! - **[`OllamaChat`]**: a local Ollama `/api/chat`.
//! - **[`DisabledModel`]**: fails every call; retrieval still works.
//!
//! Generation is not retried. A timeout or unreachable endpoint is an
//! [`RagError::ExternalService`]; an error status or a response without
//! text is a [`RagError::Generation`].

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use pdfrag_core::answer::{LanguageModel, Prompt};
use pdfrag_core::{RagError, RagResult};
use serde_json::{json, Value};

use crate::config::LlmConfig;
use crate::http::{self, CallError};

pub struct OpenAIChat {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    api_key_env: String,
    model: String,
    temperature: f32,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "language model API key not set; /chat and `ask` will fail"
            );
        }
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            api_key_env: config.api_key_env.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> RagResult<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            RagError::generation(format!("{} environment variable not set", self.api_key_env))
        })?;
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages(prompt),
        });
        let response = http::post_json(&self.client, &self.url, Some(api_key), &body)
            .await
            .map_err(|e| call_error("chat completion", e))?;
        parse_openai_reply(&response)
    }
}

fn parse_openai_reply(json: &Value) -> RagResult<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| RagError::generation("response contained no message content"))
}

pub struct OllamaChat {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: format!("{}/api/chat", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> RagResult<String> {
        let body = json!({
            "model": self.model,
            "stream": false,
            "options": { "temperature": self.temperature },
            "messages": messages(prompt),
        });
        let response = http::post_json(&self.client, &self.url, None, &body)
            .await
            .map_err(|e| call_error("ollama chat", e))?;
        response
            .pointer("/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| RagError::generation("response contained no message content"))
    }
}

/// Used when `[llm].provider = "disabled"`.
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &Prompt) -> RagResult<String> {
        Err(RagError::generation(
            "language model is disabled ([llm].provider = \"disabled\")",
        ))
    }
}

fn messages(prompt: &Prompt) -> Value {
    json!([
        { "role": "system", "content": prompt.system },
        { "role": "user", "content": prompt.user },
    ])
}

/// Transport failures are the service being unavailable; an error status
/// means the model refused or failed the request.
fn call_error(service: &str, err: CallError) -> RagError {
    match err {
        CallError::Transport(_) => err.into_external(service),
        CallError::Status { .. } => RagError::generation(format!("{} failed: {}", service, err)),
    }
}

pub fn create_language_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIChat::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaChat::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledModel)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_parse_openai_reply() {
        let json = json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "25 days."}}]
        });
        assert_eq!(parse_openai_reply(&json).unwrap(), "25 days.");

        let err = parse_openai_reply(&json!({"choices": []})).unwrap_err();
        assert_eq!(err.kind(), "generation_error");
    }

    #[test]
    fn test_messages_shape() {
        let prompt = Prompt {
            system: "sys".into(),
            user: "usr".into(),
        };
        let m = messages(&prompt);
        assert_eq!(m[0]["role"], "system");
        assert_eq!(m[0]["content"], "sys");
        assert_eq!(m[1]["role"], "user");
        assert_eq!(m[1]["content"], "usr");
    }

    #[test]
    fn test_error_status_is_generation_error() {
        let err = call_error(
            "chat completion",
            CallError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "over capacity".into(),
            },
        );
        assert_eq!(err.kind(), "generation_error");
        assert!(err.to_string().contains("over capacity"));
    }

    #[tokio::test]
    async fn test_disabled_model_fails() {
        let err = DisabledModel
            .complete(&Prompt {
                system: String::new(),
                user: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "generation_error");
    }

    #[tokio::test]
    async fn test_missing_key_fails_at_call_time() {
        let config = LlmConfig {
            api_key_env: "PDFRAG_TEST_UNSET_LLM_KEY".into(),
            ..LlmConfig::default()
        };
        let llm = create_language_model(&config).unwrap();
        let err = llm
            .complete(&Prompt {
                system: "s".into(),
                user: "u".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "generation_error");
        assert!(err.to_string().contains("PDFRAG_TEST_UNSET_LLM_KEY"));
    }
}
