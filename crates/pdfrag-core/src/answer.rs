//! Grounded answer composition.
//!
//! Retrieved chunks become a bounded context string of labelled blocks:
//!
//! ```text
//! Source: handbook.pdf | Page: 3
//!
//! <chunk text>
//!
//! ---
//!
//! Source: handbook.pdf | Page: 4
//! ...
//! ```
//!
//! The language model receives a fixed system instruction that restricts it
//! to that context and names the exact [`FALLBACK_ANSWER`] to give when the
//! context is insufficient. When nothing is retrieved the fallback is
//! returned directly and the model is not called at all.

use async_trait::async_trait;

use crate::error::{RagError, RagResult};
use crate::models::{Answer, RetrievedResult};
use crate::retrieve::Retriever;

/// The exact reply for questions the context cannot answer.
pub const FALLBACK_ANSWER: &str = "I don't have that information.";

/// Separator between context blocks.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Default upper bound on the context string, in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 12_000;

pub const SYSTEM_INSTRUCTION: &str = "You are a knowledgeable and polite support assistant. \
Answer using ONLY the provided context. \
If the answer is not in the context, say: \"I don't have that information.\"";

/// A chat prompt: system instruction plus one user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Black-box prompt → text generation.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Return the model's raw text output.
    ///
    /// Failures are [`RagError::Generation`]; a per-call timeout is a
    /// [`RagError::ExternalService`].
    async fn complete(&self, prompt: &Prompt) -> RagResult<String>;
}

/// `Source: <uri> | Page: <n>\n\n<content>`.
pub fn format_block(result: &RetrievedResult) -> String {
    let page = result
        .page_number
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "Source: {} | Page: {}\n\n{}",
        result.source_uri, page, result.content
    )
}

/// Concatenate result blocks in rank order, within `max_chars` characters.
///
/// Whole blocks are appended while they fit. If the first block alone is too
/// long it is cut at `max_chars`; later blocks that do not fit are dropped.
/// No results → empty string.
pub fn build_context(results: &[RetrievedResult], max_chars: usize) -> String {
    let delimiter_len = CONTEXT_DELIMITER.chars().count();
    let mut context = String::new();
    let mut used = 0;

    for (i, result) in results.iter().enumerate() {
        let block = format_block(result);
        let block_len = block.chars().count();
        let sep = if i == 0 { 0 } else { delimiter_len };

        if used + sep + block_len > max_chars {
            if i == 0 {
                context = block.chars().take(max_chars).collect();
            }
            break;
        }
        if i > 0 {
            context.push_str(CONTEXT_DELIMITER);
        }
        context.push_str(&block);
        used += sep + block_len;
    }
    context
}

pub fn build_prompt(context: &str, question: &str) -> Prompt {
    Prompt {
        system: SYSTEM_INSTRUCTION.to_string(),
        user: format!(
            "Context:\n{}\n\nQuestion: {}\nAnswer:",
            context, question
        ),
    }
}

/// Retrieval + prompt assembly + generation for one question.
pub struct AnswerComposer<'a> {
    retriever: Retriever<'a>,
    llm: &'a dyn LanguageModel,
    max_context_chars: usize,
}

impl<'a> AnswerComposer<'a> {
    pub fn new(retriever: Retriever<'a>, llm: &'a dyn LanguageModel) -> Self {
        Self {
            retriever,
            llm,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }

    pub fn with_max_context_chars(mut self, max_context_chars: usize) -> Self {
        self.max_context_chars = max_context_chars;
        self
    }

    /// Answer `question` from the `top_k` best chunks passing the filters.
    ///
    /// Retrieval errors (including [`RagError::IntegrationMismatch`]) pass
    /// through unchanged. Language-model failures are never replaced by a
    /// made-up answer.
    pub async fn answer(
        &self,
        question: &str,
        top_k: usize,
        project_id: Option<&str>,
        tags: Option<&[String]>,
    ) -> RagResult<Answer> {
        let results = self
            .retriever
            .retrieve(question, top_k, project_id, tags)
            .await?;

        if results.is_empty() {
            tracing::info!("no grounding context retrieved; returning fallback answer");
            return Ok(Answer {
                text: FALLBACK_ANSWER.to_string(),
                retrieved_count: 0,
            });
        }

        let context = build_context(&results, self.max_context_chars);
        let prompt = build_prompt(&context, question);

        let text = self.llm.complete(&prompt).await.map_err(|e| match e {
            RagError::Generation(_) | RagError::ExternalService { .. } => e,
            other => RagError::generation(other.to_string()),
        })?;

        tracing::info!(
            model = self.llm.model_name(),
            retrieved = results.len(),
            context_chars = context.chars().count(),
            "answer generated"
        );
        Ok(Answer {
            text,
            retrieved_count: results.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(rank: usize, source: &str, page: Option<u32>, content: &str) -> RetrievedResult {
        RetrievedResult {
            content: content.into(),
            source_uri: source.into(),
            chunk_index: rank,
            page_number: page,
            tags: vec![],
            rank,
            score: None,
        }
    }

    #[test]
    fn test_block_format() {
        let r = result(0, "doc.pdf", Some(2), "Body text.");
        assert_eq!(format_block(&r), "Source: doc.pdf | Page: 2\n\nBody text.");
        let r = result(0, "doc.pdf", None, "x");
        assert_eq!(format_block(&r), "Source: doc.pdf | Page: unknown\n\nx");
    }

    #[test]
    fn test_context_joins_in_rank_order() {
        let results = vec![
            result(0, "a.pdf", Some(1), "first"),
            result(1, "b.pdf", Some(7), "second"),
        ];
        assert_eq!(
            build_context(&results, 10_000),
            "Source: a.pdf | Page: 1\n\nfirst\n\n---\n\nSource: b.pdf | Page: 7\n\nsecond"
        );
    }

    #[test]
    fn test_empty_context() {
        assert_eq!(build_context(&[], 100), "");
    }

    #[test]
    fn test_context_is_bounded() {
        let results = vec![
            result(0, "a.pdf", Some(1), &"x".repeat(100)),
            result(1, "b.pdf", Some(1), &"y".repeat(100)),
        ];
        let first_len = format_block(&results[0]).chars().count();
        let ctx = build_context(&results, first_len + 10);
        assert_eq!(ctx, format_block(&results[0]));

        let ctx = build_context(&results, 20);
        assert_eq!(ctx.chars().count(), 20);
        assert!(ctx.starts_with("Source: a.pdf"));
    }

    #[test]
    fn test_prompt_shape() {
        let p = build_prompt("CTX", "What is X?");
        assert!(p.system.contains(FALLBACK_ANSWER));
        assert!(p.system.contains("ONLY the provided context"));
        assert_eq!(p.user, "Context:\nCTX\n\nQuestion: What is X?\nAnswer:");
    }
}
