//! Overlapping fixed-window text chunker.
//!
//! Splits the extracted corpus into windows of at most `window` characters,
//! where chunk `i` starts `window - overlap` characters after chunk `i-1`,
//! so consecutive chunks share `overlap` characters of context.
//!
//! When a hard cut at the window edge would split a token, the cut is moved
//! back to the nearest whitespace within a small tolerance; if none is found
//! the hard cut stands. Identical corpus and parameters always yield an
//! identical chunk sequence.

use crate::models::Chunk;

/// Default window size in characters.
pub const DEFAULT_WINDOW: usize = 1000;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_OVERLAP: usize = 200;

/// Split corpus text into overlapping windows.
///
/// `overlap` must be smaller than `window` (validated at config load); a
/// degenerate overlap still advances at least one character per chunk.
/// Chunk offsets are byte offsets into `corpus`, always on `char`
/// boundaries. An empty corpus yields no chunks; a corpus shorter than
/// `window` yields exactly one chunk spanning the whole corpus.
pub fn chunk_text(corpus: &str, window: usize, overlap: usize) -> Vec<Chunk> {
    if corpus.is_empty() || window == 0 {
        return Vec::new();
    }

    let step = window.saturating_sub(overlap).max(1);
    // Cut no further back than the overlap, so the next chunk's fixed start
    // never opens a gap.
    let tolerance = overlap.min(window / 5);

    // Byte offset of every char boundary, with the corpus length appended,
    // so chunk edges can be expressed in characters but sliced in bytes.
    let bounds: Vec<usize> = corpus
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(corpus.len()))
        .collect();
    let chars: Vec<char> = corpus.chars().collect();
    let total = chars.len();

    let mut chunks = Vec::new();
    let mut i = 0usize;
    loop {
        let start = i * step;
        let mut end = (start + window).min(total);

        // Prefer a whitespace boundary when the hard cut splits a token.
        if end < total && tolerance > 0 && !chars[end - 1].is_whitespace() && !chars[end].is_whitespace() {
            let floor = end - tolerance;
            if let Some(ws) = (floor..end).rev().find(|&j| chars[j].is_whitespace()) {
                end = ws + 1;
            }
        }

        chunks.push(Chunk {
            index: i,
            text: corpus[bounds[start]..bounds[end]].to_string(),
            start: bounds[start],
            end: bounds[end],
        });

        if end >= total {
            break;
        }
        i += 1;
    }

    chunks
}
