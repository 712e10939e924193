//! Sliding-window text chunker.
//!
//! Splits extracted document text into overlapping windows of `size`
//! characters, where each window after the first starts `overlap`
//! characters before the previous one ended. Positions are counted in
//! Unicode scalar values, so multi-byte text is never split mid-character.

/// Default window length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 800;
/// Default overlap between consecutive windows in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Window size and overlap used by [`split_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkPolicy {
    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        split_text(text, self.size, self.overlap)
    }
}

/// Split `text` into ordered, non-empty, overlapping substrings.
///
/// `overlap >= size` is a caller error; the cursor still advances to the end
/// of the previous window so the loop always terminates.
pub fn split_text(text: &str, size: usize, overlap: usize) -> Vec<&str> {
    if text.is_empty() || size == 0 {
        return Vec::new();
    }

    // Byte offset of every char boundary, plus the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let n = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < n {
        let end = (start + size).min(n);
        chunks.push(&text[bounds[start]..bounds[end]]);
        if end == n {
            break;
        }
        start = match end.checked_sub(overlap) {
            Some(next) if next > start => next,
            _ => end,
        };
    }
    chunks
}
