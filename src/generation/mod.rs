// Generation module
// Seam for the external text-generation collaborator; the pipeline only ever
// sees `generate(prompt) -> text`

use std::sync::Arc;

use crate::Result;
use crate::config::Config;
use crate::embeddings::OllamaClient;

/// External text-generation capability. Selected once at startup from
/// configuration, like the embedding provider.
pub trait GenerationProvider: Send + Sync {
    /// Forward a prompt and return the model's raw text response.
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Generation provider backed by an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: OllamaClient,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

impl GenerationProvider for OllamaGenerator {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<String> {
        self.client.generate(prompt)
    }
}

/// Build the generation provider selected by the configuration.
#[inline]
pub fn generator_from_config(config: &Config) -> Result<Arc<dyn GenerationProvider>> {
    let client = OllamaClient::new(&config.ollama)?;
    Ok(Arc::new(OllamaGenerator::new(client)))
}
