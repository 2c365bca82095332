
use tracing::trace;

use crate::Result;
use crate::embeddings::{EmbeddingProvider, truncate_chars};

const CHAR_BAND_END: usize = 128;
const WORD_BAND_END: usize = 256;
const VOWELS: &str = "aeiou";

/// Deterministic local embedding provider.
///
/// Builds a vector from character codes, per-word hashes and simple text
/// statistics, then L2-normalizes it. Identical text always yields a
/// bit-identical vector, which makes this implementation suitable for tests
/// and for running without an embedding service.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dimension: usize,
    max_input_chars: usize,
}

impl LocalEmbedder {
    #[inline]
    pub fn new(dimension: usize, max_input_chars: usize) -> Self {
        Self {
            dimension,
            max_input_chars,
        }
    }
}

impl EmbeddingProvider for LocalEmbedder {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = truncate_chars(text, self.max_input_chars);
        let text = text.to_lowercase();
        let text = text.trim();

        if text.is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let chars: Vec<char> = text.chars().collect();
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut embedding = vec![0.0_f32; self.dimension];

        // Band a: character codes, index-modulo-length lookup.
        for (i, value) in embedding
            .iter_mut()
            .take(CHAR_BAND_END.min(self.dimension))
            .enumerate()
        {
            let c = chars[i % chars.len()];
            *value = (c as u32 as f32) / 255.0;
        }

        // Band b: one dimension per word, hash normalized to [0, 1].
        let word_band_end = WORD_BAND_END.min(self.dimension);
        for (word, value) in words
            .iter()
            .zip(embedding[CHAR_BAND_END.min(self.dimension)..word_band_end].iter_mut())
        {
            *value = (word_hash(word) as f32) / (u32::MAX as f32);
        }

        // Band c: scalar statistics, then a deterministic pseudo-random tail
        // seeded from the text so the fill is reproducible.
        let text_seed = word_hash(text) as u64;
        let vowel_count = chars.iter().filter(|c| VOWELS.contains(**c)).count();
        for i in WORD_BAND_END.min(self.dimension)..self.dimension {
            let offset = i - WORD_BAND_END.min(self.dimension);
            embedding[i] = match offset {
                0 => (chars.len() as f32) / 1000.0,
                1 => (words.len() as f32) / 100.0,
                2 => (vowel_count as f32) / (chars.len() as f32),
                _ => seeded_noise(text_seed, i as u64),
            };
        }

        l2_normalize(&mut embedding);

        trace!("Embedded {} chars into {} dimensions", chars.len(), self.dimension);
        Ok(embedding)
    }
}

/// 31-multiplier string hash, deterministic across runs and platforms.
fn word_hash(word: &str) -> u32 {
    word.bytes()
        .fold(0_u32, |hash, byte| hash.wrapping_mul(31).wrapping_add(u32::from(byte)))
}

/// Deterministic pseudo-random value in (-0.1, 0.1) from an xorshift64* step.
fn seeded_noise(seed: u64, index: u64) -> f32 {
    let mut state = seed.wrapping_add(index).wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    state ^= state >> 12;
    state ^= state << 25;
    state ^= state >> 27;
    let mixed = state.wrapping_mul(0x2545_F491_4F6C_DD1D);
    let unit = (mixed >> 11) as f32 / (1_u64 << 53) as f32;
    (unit - 0.5) * 0.2
}

/// Divide by the Euclidean norm; a zero vector is left unchanged.
fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
