// Embeddings module
// Capability interface for turning text into fixed-dimension vectors, with a
// deterministic local implementation and a remote Ollama-backed one

pub mod local;
pub mod ollama;

use std::sync::Arc;

use crate::Result;
use crate::config::{Config, EmbeddingProviderKind};

pub use local::LocalEmbedder;
pub use ollama::{OllamaClient, OllamaEmbedder};

/// Produces a fixed-dimension embedding vector for a text string.
///
/// Implementations truncate input to the configured character budget before
/// embedding. The implementation is selected once at startup from config;
/// callers never branch on the concrete type.
pub trait EmbeddingProvider: Send + Sync {
    /// The dimension of every vector this provider produces.
    fn dimension(&self) -> usize;

    /// Embed a text string into a vector of length [`dimension`](Self::dimension).
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Build the embedding provider selected by the configuration.
#[inline]
pub fn provider_from_config(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    let dimension = config.embedding.dimension as usize;
    let max_input_chars = config.embedding.max_input_chars;

    match config.embedding.provider {
        EmbeddingProviderKind::Local => {
            Ok(Arc::new(LocalEmbedder::new(dimension, max_input_chars)))
        }
        EmbeddingProviderKind::Ollama => {
            let client = OllamaClient::new(&config.ollama)?;
            Ok(Arc::new(OllamaEmbedder::new(
                client,
                dimension,
                max_input_chars,
            )))
        }
    }
}

/// Truncate text to at most `max_chars` characters, respecting char
/// boundaries. Upstream embedding services enforce input limits; truncating
/// here keeps both implementations under the same budget.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
