//! Overlapping, boundary-preferring text chunker.
//!
//! Splits extracted document text into [`Chunk`]s bounded by a configurable
//! `max_chars` budget, with `overlap_chars` shared between consecutive
//! chunks so context survives chunk boundaries. Splitting prefers natural
//! boundaries (paragraph, then sentence, then word) and falls back to a
//! hard cut when no boundary exists within the budget.
//!
//! Chunking is deterministic: identical input text under a fixed
//! configuration always yields identical chunk boundaries. Each chunk
//! carries a SHA-256 hash of its text and, when the source has pages, the
//! page it originated from. Chunks never span pages.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;
use crate::parse::PageText;

/// Split a document's pages into chunks with contiguous indices starting at 0.
pub fn chunk_document(
    source_id: &str,
    pages: &[PageText],
    max_chars: usize,
    overlap_chars: usize,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut chunk_index: i64 = 0;

    for page in pages {
        if page.text.trim().is_empty() {
            continue;
        }
        for (start, end) in split_spans(&page.text, max_chars, overlap_chars) {
            chunks.push(make_chunk(
                source_id,
                chunk_index,
                &page.text[start..end],
                page.page,
            ));
            chunk_index += 1;
        }
    }

    // Guarantee at least one chunk per document
    if chunks.is_empty() {
        let page = pages.first().and_then(|p| p.page);
        chunks.push(make_chunk(source_id, 0, "", page));
    }

    chunks
}

/// Compute chunk byte ranges over one text. Every range ends on a char
/// boundary; consecutive ranges share `overlap` bytes (adjusted down to
/// the nearest char boundary).
fn split_spans(text: &str, max_chars: usize, overlap: usize) -> Vec<(usize, usize)> {
    let len = text.len();
    let mut spans = Vec::new();
    let mut start = 0usize;

    while start < len {
        if len - start <= max_chars {
            spans.push((start, len));
            break;
        }

        let hard_end = floor_char_boundary(text, start + max_chars);
        let cut = find_cut(&text[start..hard_end], overlap);
        spans.push((start, start + cut));

        let mut next = start + cut.saturating_sub(overlap);
        while !text.is_char_boundary(next) {
            next -= 1;
        }
        if next <= start {
            // Window smaller than the overlap; advance without one
            next = start + cut;
        }
        start = next;
    }

    spans
}

/// Pick a cut point inside `window`, preferring paragraph, then sentence,
/// then line, then word boundaries. The cut must leave more than `overlap`
/// bytes behind it so the next chunk makes forward progress; otherwise the
/// next boundary class is tried, ending in a hard cut at the window edge.
fn find_cut(window: &str, overlap: usize) -> usize {
    if let Some(pos) = window.rfind("\n\n") {
        let end = pos + 2;
        if end > overlap {
            return end;
        }
    }
    for pat in [". ", "! ", "? ", "\n"] {
        if let Some(pos) = window.rfind(pat) {
            let end = pos + pat.len();
            if end > overlap {
                return end;
            }
        }
    }
    if let Some(pos) = window.rfind(' ') {
        let end = pos + 1;
        if end > overlap {
            return end;
        }
    }
    window.len()
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn make_chunk(source_id: &str, index: i64, text: &str, page: Option<i64>) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        source_id: source_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        page,
        hash,
    }
}
