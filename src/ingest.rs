//! `pdfrag ingest`: index one PDF from disk.
//!
//! A partial ingestion prints the failed chunk indices together with the
//! command that retries just those chunks under the same document id.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use pdfrag_core::index::{IngestReport, IngestStatus};
use pdfrag_core::models::{parse_tags, DocumentMeta};
use uuid::Uuid;

use crate::config::Config;
use crate::server::{DEFAULT_PROJECT_ID, DEFAULT_TAGS};
use crate::services::{prepare_store, Services};

pub struct IngestArgs {
    pub project_id: Option<String>,
    pub tags: Option<String>,
    pub document_id: Option<String>,
    pub only: Option<String>,
}

pub async fn run_ingest(config: &Config, file: &Path, args: IngestArgs) -> Result<()> {
    let only = args.only.as_deref().map(parse_only).transpose()?;
    if only.is_some() && args.document_id.is_none() {
        bail!("--only requires --document-id (the document being resumed)");
    }

    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let source_uri = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    let project_id = args
        .project_id
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PROJECT_ID.to_string());
    let tags = parse_tags(args.tags.as_deref().unwrap_or(DEFAULT_TAGS));

    let doc = match args.document_id {
        Some(id) => {
            let id = Uuid::parse_str(id.trim())
                .with_context(|| format!("Invalid --document-id: {}", id))?;
            DocumentMeta::with_id(id, source_uri, project_id, tags)
        }
        None => DocumentMeta::new(source_uri, project_id, tags),
    };

    let services = Services::from_config(config)?;
    prepare_store(&config.store).await?;

    let report = services
        .pipeline()
        .ingest_bytes(services.loader.as_ref(), &bytes, &doc, only.as_ref())
        .await?;

    print_report(file, &report);
    if report.status() == IngestStatus::Failed {
        bail!("no chunks of {} were indexed", file.display());
    }
    Ok(())
}

/// Parse `--only 5,7` into chunk indices.
pub fn parse_only(raw: &str) -> Result<BTreeSet<usize>> {
    let indices = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .with_context(|| format!("Invalid chunk index in --only: '{}'", s))
        })
        .collect::<Result<BTreeSet<usize>>>()?;
    if indices.is_empty() {
        bail!("--only needs at least one chunk index");
    }
    Ok(indices)
}

fn print_report(file: &Path, report: &IngestReport) {
    let status = match report.status() {
        IngestStatus::Success => "success",
        IngestStatus::Partial => "partial",
        IngestStatus::Failed => "failed",
    };
    println!("ingest {}", file.display());
    println!("  document_id: {}", report.document_id);
    println!("  status: {}", status);
    println!("  chunks: {}", report.chunks);
    println!("  succeeded: {}", report.succeeded.len());
    println!("  failed: {}", report.failed.len());
    for failure in &report.failed {
        println!(
            "    [chunk {}] {}: {}",
            failure.chunk_index, failure.kind, failure.message
        );
    }
    if !report.failed.is_empty() {
        let indices: Vec<String> = report
            .failed_indices()
            .iter()
            .map(|i| i.to_string())
            .collect();
        println!(
            "  resume: pdfrag ingest {} --document-id {} --only {}",
            file.display(),
            report.document_id,
            indices.join(",")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_only() {
        let set = parse_only("5, 7,5").unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![5, 7]);
        assert!(parse_only("5,x").is_err());
        assert!(parse_only(" , ").is_err());
    }
}
