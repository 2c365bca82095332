// Chunking module
// Splits normalized text into overlapping sentence-based chunks for embedding

#[cfg(test)]
mod tests;

use std::sync::LazyLock;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RagError, Result};

/// Configuration for text chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Chunk size budget in characters
    pub chunk_size: usize,
    /// Overlap budget in characters carried between adjacent chunks
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// Matches one sentence ending in `.`, `!` or `?`, where the terminator is
/// followed by whitespace and an uppercase letter or by the end of the text.
static SENTENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([^.!?]+[.!?]+)(?=\s+\p{Lu}|\s*$)").expect("valid regex")
});

/// Split text into overlapping chunks along sentence boundaries.
///
/// Sentences are accumulated greedily until adding the next one would push
/// the current chunk past `chunk_size`; the next chunk is then seeded with
/// the longest suffix of already-emitted sentences that fits within
/// `overlap`, preserving original order. The size budget is soft: a single
/// sentence longer than `chunk_size` is still emitted whole.
#[inline]
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(RagError::InvalidParameters(format!(
            "chunk size must be positive and overlap ({overlap}) must be less than chunk size ({chunk_size})"
        )));
    }

    if text.trim().is_empty() {
        return Err(RagError::InvalidInput(
            "text cannot be empty or whitespace-only".to_string(),
        ));
    }

    let normalized = normalize_whitespace(text);
    let sentences = split_into_sentences(&normalized);

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for (i, sentence) in sentences.iter().enumerate() {
        let sentence_len = sentence.chars().count();

        if current_len + sentence_len > chunk_size && current_len > 0 {
            chunks.push(current.join(" "));

            // Seed the next chunk with trailing sentences that fit the
            // overlap budget, walked backward so order is preserved.
            let mut overlap_sentences: Vec<&str> = Vec::new();
            let mut overlap_len = 0;
            for prev in sentences[..i].iter().rev() {
                let prev_len = prev.chars().count();
                if overlap_len + prev_len > overlap {
                    break;
                }
                overlap_sentences.insert(0, prev);
                overlap_len += prev_len;
            }

            current = overlap_sentences;
            current_len = current.iter().map(|s| s.chars().count() + 1).sum();
        }

        current.push(sentence);
        current_len += sentence_len + 1;
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    debug!(
        "Chunked {} chars into {} chunks ({} sentences)",
        normalized.chars().count(),
        chunks.len(),
        sentences.len()
    );

    Ok(chunks)
}

/// Chunk text using the budgets from a [`ChunkingConfig`].
#[inline]
pub fn chunk_with_config(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    chunk_text(text, config.chunk_size, config.overlap)
}

/// Collapse all whitespace runs to single spaces and trim the ends.
fn normalize_whitespace(text: &str) -> String {
    itertools::join(text.split_whitespace(), " ")
}

/// Split text into sentence units.
///
/// Falls back to splitting on bare periods when the boundary heuristic finds
/// nothing (e.g. lowercase-only prose or text without terminators).
fn split_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();

    for captures in SENTENCE_REGEX.captures_iter(text).flatten() {
        if let Some(sentence) = captures.get(1) {
            let trimmed = sentence.as_str().trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
        }
    }

    if sentences.is_empty() {
        for part in text.split('.') {
            let trimmed = part.trim();
            if !trimmed.is_empty() {
                sentences.push(format!("{trimmed}."));
            }
        }
    }

    sentences
}
