//! Text chunking.
//!
//! Splits page text into bounded-size segments for embedding. Sizes are
//! counted in characters, and separators stay attached to the piece they
//! terminate, so concatenating the chunks in order reproduces the input
//! exactly.

use notegraph_core::{Error, Result};

/// Boundary preference, strongest first: paragraph, line, sentence, word.
/// Text that cannot be split on any of these is cut at character bounds.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Chunker that descends through boundary levels before cutting text.
pub struct TextChunker {
    pub max_chunk_size: usize,
}

impl TextChunker {
    pub fn new(max_chunk_size: usize) -> Self {
        Self { max_chunk_size }
    }

    /// Split `text` into ordered chunks of at most `max_chunk_size` characters.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        split_recursive(text, self.max_chunk_size, &SEPARATORS)
    }
}

/// Split `text` into ordered chunks of at most `max_chunk_size` characters.
///
/// Fails with `InvalidArgument` when `max_chunk_size` is zero. Empty input
/// yields an empty sequence.
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Result<Vec<String>> {
    if max_chunk_size == 0 {
        return Err(Error::InvalidArgument(
            "chunk size must be greater than zero".to_string(),
        ));
    }
    Ok(TextChunker::new(max_chunk_size).chunk(text))
}

fn split_recursive(text: &str, max_size: usize, separators: &[&str]) -> Vec<String> {
    if char_len(text) <= max_size {
        return vec![text.to_string()];
    }

    let Some((separator, remaining)) = separators.split_first() else {
        return hard_split(text, max_size);
    };

    let pieces = split_keeping_separator(text, separator);
    if pieces.len() <= 1 {
        return split_recursive(text, max_size, remaining);
    }

    // Greedily pack adjacent pieces up to the size limit.
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_size = 0usize;

    for piece in pieces {
        let piece_size = char_len(piece);

        if piece_size > max_size {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_size = 0;
            }
            // This piece has no occurrence of the current separator left
            // in it; descend to the next boundary level.
            chunks.extend(split_recursive(piece, max_size, remaining));
        } else if current_size + piece_size > max_size && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current.push_str(piece);
            current_size = piece_size;
        } else {
            current.push_str(piece);
            current_size += piece_size;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split on `separator`, keeping each separator attached to the piece
/// it terminates.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for (idx, matched) in text.match_indices(separator) {
        let end = idx + matched.len();
        pieces.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

/// Last resort: cut at character boundaries every `max_size` characters.
fn hard_split(text: &str, max_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;

    for ch in text.chars() {
        if count == max_size {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
