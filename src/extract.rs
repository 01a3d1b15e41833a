//! PDF text extraction, one [`Page`] per PDF page.
//!
//! Extraction is pure CPU work on bytes already in memory; callers on an
//! async runtime run it on a blocking thread.

use pdfrag_core::ingest::PageLoader;
use pdfrag_core::models::Page;
use pdfrag_core::{RagError, RagResult};

/// Every PDF starts with this header (possibly after a few junk bytes).
const PDF_MAGIC: &[u8] = b"%PDF-";

/// [`PageLoader`] backed by `pdf-extract`. Page numbers are 1-based.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfLoader;

impl PageLoader for PdfLoader {
    fn load_pages(&self, bytes: &[u8]) -> RagResult<Vec<Page>> {
        if bytes.is_empty() {
            return Err(RagError::validation("uploaded file is empty"));
        }
        if !looks_like_pdf(bytes) {
            return Err(RagError::validation("uploaded file is not a PDF"));
        }
        // pdf-extract panics on some malformed font and encoding tables.
        let texts = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
            .map_err(|_| RagError::validation("PDF extraction failed: unreadable document"))?
            .map_err(|e| RagError::validation(format!("PDF extraction failed: {}", e)))?;

        Ok(texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Page::new(i as u32 + 1, text))
            .collect())
    }
}

fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes
        .windows(PDF_MAGIC.len())
        .take(1024)
        .any(|w| w == PDF_MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_input() {
        let err = PdfLoader.load_pages(b"").unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn test_rejects_non_pdf() {
        let err = PdfLoader.load_pages(b"just some text").unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        assert!(err.to_string().contains("not a PDF"));
    }

    #[test]
    fn test_rejects_corrupt_pdf() {
        let err = PdfLoader.load_pages(b"%PDF-1.4\ngarbage").unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }
}
