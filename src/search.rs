//! `pdfrag search`: retrieval without generation.

use anyhow::Result;
use pdfrag_core::models::{parse_tags, RetrievedResult};
use pdfrag_core::RagError;

use crate::config::Config;
use crate::services::Services;

/// Resolve `--top-k` against the configured default; 0 is rejected.
pub fn resolve_top_k(top_k: Option<usize>, default_top_k: usize) -> Result<usize, RagError> {
    match top_k {
        None => Ok(default_top_k),
        Some(0) => Err(RagError::validation("top_k must be >= 1")),
        Some(k) => Ok(k),
    }
}

/// `--tags a,b` → `Some(["a", "b"])`; absent or blank → `None`.
pub fn tag_filter(tags: Option<&str>) -> Option<Vec<String>> {
    tags.map(parse_tags).filter(|t| !t.is_empty())
}

pub async fn run_search(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    project_id: Option<String>,
    tags: Option<String>,
) -> Result<()> {
    let services = Services::from_config(config)?;
    let top_k = resolve_top_k(top_k, services.settings.default_top_k)?;
    let tags = tag_filter(tags.as_deref());

    let results = services
        .retriever()
        .retrieve(query, top_k, project_id.as_deref(), tags.as_deref())
        .await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for result in &results {
        print_result(result);
    }
    Ok(())
}

fn print_result(result: &RetrievedResult) {
    let page = result
        .page_number
        .map(|p| format!("p.{}", p))
        .unwrap_or_else(|| "p.?".to_string());
    match result.score {
        Some(score) => println!(
            "{}. [{:.2}] {} {} (chunk {})",
            result.rank + 1,
            score,
            result.source_uri,
            page,
            result.chunk_index
        ),
        None => println!(
            "{}. {} {} (chunk {})",
            result.rank + 1,
            result.source_uri,
            page,
            result.chunk_index
        ),
    }
    if !result.tags.is_empty() {
        println!("    tags: {}", result.tags.join(", "));
    }
    println!("    excerpt: \"{}\"", excerpt(&result.content, 200));
    println!();
}

/// First `max_chars` characters on one line.
fn excerpt(content: &str, max_chars: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut.trim_end())
    }
}
