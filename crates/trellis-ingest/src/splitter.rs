use trellis_core::error::{Result, TrellisError};

/// Separator hierarchy: paragraphs first, then lines, words, characters.
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Recursive character text splitter.
///
/// Splits on the coarsest separator that appears in the text, merges the
/// pieces back into chunks of at most `chunk_size` bytes, and carries
/// `chunk_overlap` bytes of trailing context into the next chunk. Pieces
/// that are still too large recurse onto the next finer separator.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 200,
        }
    }
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(TrellisError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(TrellisError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split text into overlapping chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // Pick the coarsest separator present in the text.
        let mut separator = "";
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() || text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        if separator.is_empty() {
            return self.split_chars(text);
        }

        let mut chunks = Vec::new();
        let mut good: Vec<String> = Vec::new();
        for piece in text.split(separator) {
            if piece.len() < self.chunk_size {
                good.push(piece.to_string());
            } else {
                if !good.is_empty() {
                    chunks.extend(self.merge_pieces(std::mem::take(&mut good), separator));
                }
                if remaining.is_empty() {
                    chunks.push(piece.to_string());
                } else {
                    chunks.extend(self.split_with(piece, remaining));
                }
            }
        }
        if !good.is_empty() {
            chunks.extend(self.merge_pieces(good, separator));
        }
        chunks
    }

    /// Merge small pieces back into chunks, keeping `chunk_overlap` bytes of
    /// trailing pieces as the start of the next chunk.
    fn merge_pieces(&self, pieces: Vec<String>, separator: &str) -> Vec<String> {
        let sep_len = separator.len();
        let mut chunks = Vec::new();
        let mut window: Vec<String> = Vec::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = piece.len();
            let joint = if window.is_empty() { 0 } else { sep_len };

            if total + len + joint > self.chunk_size && !window.is_empty() {
                push_chunk(&mut chunks, &window, separator);
                // Slide the window forward until the overlap budget fits.
                while total > self.chunk_overlap
                    || (total + len + if window.is_empty() { 0 } else { sep_len }
                        > self.chunk_size
                        && total > 0)
                {
                    let had_joint = window.len() > 1;
                    let first = window.remove(0);
                    total -= first.len() + if had_joint { sep_len } else { 0 };
                }
            }

            total += len + if window.is_empty() { 0 } else { sep_len };
            window.push(piece);
        }

        if !window.is_empty() {
            push_chunk(&mut chunks, &window, separator);
        }
        chunks
    }

    /// Last resort: fixed-size character windows.
    fn split_chars(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
        let mut out = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            out.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        out
    }
}

fn push_chunk(chunks: &mut Vec<String>, window: &[String], separator: &str) {
    let joined = window.join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
