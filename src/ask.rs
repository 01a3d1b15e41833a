//! `pdfrag ask`: retrieval plus grounded generation.

use anyhow::Result;

use crate::config::Config;
use crate::search::{resolve_top_k, tag_filter};
use crate::services::Services;

pub async fn run_ask(
    config: &Config,
    question: &str,
    top_k: Option<usize>,
    project_id: Option<String>,
    tags: Option<String>,
) -> Result<()> {
    let services = Services::from_config(config)?;
    let top_k = resolve_top_k(top_k, services.settings.default_top_k)?;
    let tags = tag_filter(tags.as_deref());

    let answer = services
        .composer()
        .answer(question, top_k, project_id.as_deref(), tags.as_deref())
        .await?;

    println!("{}", answer.text.trim());
    println!();
    println!("(retrieved chunks: {})", answer.retrieved_count);
    Ok(())
}
