//! Fixed-window, overlapping page chunker.
//!
//! Splits page-tagged text into [`PageChunk`]s of at most `chunk_size`
//! characters, each overlapping its predecessor on the same page by exactly
//! `chunk_overlap` characters. Sizes are counted in Unicode scalar values,
//! so a chunk boundary never falls inside a multi-byte character.
//!
//! # Algorithm
//!
//! 1. Trim each page; skip pages that are empty afterwards.
//! 2. Slide a window of `chunk_size` chars with step `chunk_size - chunk_overlap`.
//! 3. If the chars left after a window's end are no more than `chunk_overlap`,
//!    extend that window to the end of the page and stop. A chunk is therefore
//!    at most `chunk_size + chunk_overlap` chars long.
//! 4. Number chunks `0, 1, 2, …` across the whole document, in page order.
//!
//! The output depends only on the input text and the parameters.
//!
//! # Example
//!
//! ```rust
//! use pdfrag_core::chunk::{chunk_pages, ChunkingParams};
//! use pdfrag_core::models::Page;
//!
//! let pages = vec![Page::new(1, "a".repeat(1000)), Page::new(2, "b".repeat(50))];
//! let chunks = chunk_pages(&pages, &ChunkingParams::default()).unwrap();
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[2].page_number, Some(2));
//! ```

use crate::error::{RagError, RagResult};
use crate::models::{Page, PageChunk};

/// Chunk sizing, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }
}

impl ChunkingParams {
    pub fn validate(&self) -> RagResult<()> {
        if self.chunk_size == 0 {
            return Err(RagError::validation("chunk_size must be > 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::validation(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Upper bound on the length of any produced chunk.
    pub fn max_chunk_chars(&self) -> usize {
        self.chunk_size + self.chunk_overlap
    }
}

/// Split pages into overlapping chunks with document-wide indices.
///
/// An empty document (or one whose pages are all blank) yields no chunks.
pub fn chunk_pages(pages: &[Page], params: &ChunkingParams) -> RagResult<Vec<PageChunk>> {
    params.validate()?;

    let mut chunks = Vec::new();
    for page in pages {
        for content in split_page(page.text.trim(), params) {
            chunks.push(PageChunk {
                chunk_index: chunks.len(),
                page_number: page.number,
                content,
            });
        }
    }
    Ok(chunks)
}

fn split_page(text: &str, params: &ChunkingParams) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every char start, plus the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = bounds.len() - 1;

    let mut pieces = Vec::new();
    let mut start = 0;
    loop {
        let mut end = (start + params.chunk_size).min(total);
        if total - end <= params.chunk_overlap {
            end = total;
        }
        pieces.push(text[bounds[start]..bounds[end]].to_string());
        if end == total {
            break;
        }
        start = end - params.chunk_overlap;
    }
    pieces
}
