//! Paragraph-packing chunker.
//!
//! Turns a document body into bounded chunks for vector indexing.
//! All lengths are counted in Unicode scalar values, never bytes, so Thai
//! text is measured the same way it is displayed.
//!
//! # Algorithm
//!
//! 1. Truncate the body to `max_doc_chars`.
//! 2. Split on blank lines; collapse whitespace runs inside each paragraph.
//! 3. Hard-split any paragraph longer than `chunk_size` at the last space
//!    before the limit (or exactly at the limit when there is none).
//! 4. Greedily pack paragraphs, joined by `\n`, while the chunk stays
//!    within `chunk_size`.
//! 5. Stop after `max_chunks_per_doc` chunks.
//!
//! ```rust
//! use helpdesk_core::chunk::split;
//! use helpdesk_core::settings::ChunkParams;
//!
//! let chunks = split("Fees are due in June.\n\nPay at the finance office.", &ChunkParams::default());
//! assert_eq!(chunks, vec!["Fees are due in June.\nPay at the finance office."]);
//! ```

use sha2::{Digest, Sha256};

use crate::models::{chunk_id, Chunk};
use crate::settings::ChunkParams;

/// Split `text` into chunk strings, each at most `chunk_size` chars.
pub fn split(text: &str, params: &ChunkParams) -> Vec<String> {
    let size = params.chunk_size.max(1);
    let text = truncate_chars(text, params.max_doc_chars);

    let mut chunks: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut buf_len = 0usize;

    for para in paragraphs(text) {
        for piece in hard_split(&para, size) {
            if chunks.len() >= params.max_chunks_per_doc {
                return chunks;
            }
            let piece_len = piece.chars().count();
            if buf.is_empty() {
                buf = piece;
                buf_len = piece_len;
            } else if buf_len + 1 + piece_len <= size {
                buf.push('\n');
                buf.push_str(&piece);
                buf_len += 1 + piece_len;
            } else {
                chunks.push(std::mem::replace(&mut buf, piece));
                buf_len = piece_len;
            }
        }
    }

    if !buf.is_empty() && chunks.len() < params.max_chunks_per_doc {
        chunks.push(buf);
    }
    chunks
}

/// Split a document body into [`Chunk`] records with contiguous indices
/// and SHA-256 content hashes. Empty bodies produce no chunks.
pub fn chunk_document(document_id: &str, text: &str, params: &ChunkParams) -> Vec<Chunk> {
    into_chunks(document_id, split(text, params))
}

/// Attach ids, indices and hashes to already split texts.
pub fn into_chunks(document_id: &str, texts: Vec<String>) -> Vec<Chunk> {
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let index = i as i64;
            Chunk {
                id: chunk_id(document_id, index),
                document_id: document_id.to_string(),
                chunk_index: index,
                hash: content_hash(&text),
                text,
            }
        })
        .collect()
}

/// Hex SHA-256 of a chunk's text.
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Blank-line separated paragraphs with internal whitespace collapsed.
fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            flush_paragraph(&mut current, &mut out);
        } else {
            current.push(line);
        }
    }
    flush_paragraph(&mut current, &mut out);
    out
}

fn flush_paragraph(lines: &mut Vec<&str>, out: &mut Vec<String>) {
    if lines.is_empty() {
        return;
    }
    let joined = lines
        .iter()
        .flat_map(|l| l.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");
    if !joined.is_empty() {
        out.push(joined);
    }
    lines.clear();
}

/// Cut an over-long paragraph into pieces of at most `size` chars.
fn hard_split(para: &str, size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = para;
    while let Some((limit, _)) = rest.char_indices().nth(size) {
        let window = &rest[..limit];
        let (piece, next) = if rest[limit..].starts_with(' ') {
            (window, &rest[limit..])
        } else {
            match window.rfind(' ') {
                Some(pos) if pos > 0 => (&rest[..pos], &rest[pos + 1..]),
                _ => (window, &rest[limit..]),
            }
        };
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        rest = next.trim_start();
    }
    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}
