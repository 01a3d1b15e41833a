//! Integration tests for the `pdfrag` binary.
//!
//! The config points at the in-memory store and an Ollama embedder on an
//! unreachable port with retries disabled, so every command runs offline.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_content = format!(
        r#"[chunking]
chunk_size = 500
chunk_overlap = 100

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 6
url = "http://127.0.0.1:9"
max_retries = 0
timeout_secs = 5

[store]
provider = "memory"

[llm]
provider = "disabled"
{}
"#,
        extra
    );
    let config_path = root.join("pdfrag.toml");
    fs::write(&config_path, config_content).unwrap();

    fs::write(root.join("notes.txt"), "plain text, not a PDF").unwrap();
    fs::write(root.join("handbook.pdf"), two_page_pdf()).unwrap();

    (tmp, config_path)
}

/// Two-page PDF with correct xref offsets.
fn two_page_pdf() -> Vec<u8> {
    let mut out = Vec::new();
    let mut offsets = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [4 0 R 6 0 R] /Count 2 >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(
        b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    for (page_obj, text) in [(4, "First page about vacation."), (6, "Second page about deploys.")] {
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_obj,
                page_obj + 1
            )
            .as_bytes(),
        );
        let stream = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                page_obj + 1,
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            offsets.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

fn run_pdfrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = env!("CARGO_BIN_EXE_pdfrag");
    let output = Command::new(binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .current_dir(config_path.parent().unwrap())
        .env_remove("EMBED_MODEL")
        .env_remove("CHUNK_SIZE")
        .env_remove("CHUNK_OVERLAP")
        .env_remove("DEFAULT_TOP_K")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pdfrag binary at {}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_memory_store() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, stderr, ok) = run_pdfrag(&config, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("needs no initialization"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config) = setup_test_env("");
    let content = fs::read_to_string(&config)
        .unwrap()
        .replace("chunk_overlap = 100", "chunk_overlap = 500");
    fs::write(&config, content).unwrap();

    let (_, stderr, ok) = run_pdfrag(&config, &["init"]);
    assert!(!ok);
    assert!(stderr.contains("chunk_overlap"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let (tmp, _) = setup_test_env("");
    let missing = tmp.path().join("nope.toml");
    let (_, stderr, ok) = run_pdfrag(&missing, &["init"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_ingest_only_requires_document_id() {
    let (_tmp, config) = setup_test_env("");
    let (_, stderr, ok) = run_pdfrag(&config, &["ingest", "handbook.pdf", "--only", "1"]);
    assert!(!ok);
    assert!(stderr.contains("--document-id"));
}

#[test]
fn test_ingest_rejects_non_pdf() {
    let (_tmp, config) = setup_test_env("");
    let (_, stderr, ok) = run_pdfrag(&config, &["ingest", "notes.txt"]);
    assert!(!ok);
    assert!(stderr.contains("not a PDF"));
}

#[test]
fn test_ingest_reports_failed_chunks_with_resume_command() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, _, ok) = run_pdfrag(
        &config,
        &["ingest", "handbook.pdf", "--project-id", "acme", "--tags", "hr"],
    );
    assert!(!ok, "ingest with an unreachable embedder must fail");
    assert!(stdout.contains("status: failed"));
    assert!(stdout.contains("chunks: 2"));
    assert!(stdout.contains("failed: 2"));
    assert!(stdout.contains("external_service_error"));
    assert!(stdout.contains("--only 0,1"));
}

#[test]
fn test_search_rejects_zero_top_k() {
    let (_tmp, config) = setup_test_env("");
    let (_, stderr, ok) = run_pdfrag(&config, &["search", "vacation", "--top-k", "0"]);
    assert!(!ok);
    assert!(stderr.contains("top_k must be >= 1"));
}
