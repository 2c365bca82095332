
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::OllamaConfig;
use crate::embeddings::{EmbeddingProvider, truncate_chars};
use crate::{RagError, Result};

pub(crate) const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub(crate) const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// HTTP client for an Ollama server, covering both the embedding and the
/// text-generation endpoints. All requests run under a fixed timeout and a
/// bounded retry-with-backoff restricted to retryable failures.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    pub(crate) base_url: Url,
    pub(crate) embedding_model: String,
    pub(crate) generation_model: String,
    agent: ureq::Agent,
    pub(crate) retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .url()
            .map_err(|e| RagError::Config(format!("Invalid Ollama URL: {e}")))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Ping the Ollama server to check if it's responsive.
    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self
            .base_url
            .join("/api/tags")
            .map_err(|e| RagError::Config(format!("Failed to build ping URL: {e}")))?;

        debug!("Pinging Ollama server at {}", url);

        self.request_with_retry(|| {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .map_err(RagError::Embedding)?;

        debug!("Server ping successful");
        Ok(())
    }

    /// Generate an embedding for a single text input.
    #[inline]
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Requesting embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: self.embedding_model.clone(),
            prompt: text.to_string(),
        };

        let url = self
            .base_url
            .join("/api/embed")
            .map_err(|e| RagError::Config(format!("Failed to build embedding URL: {e}")))?;

        let request_json = serde_json::to_string(&request)
            .map_err(|e| RagError::Embedding(format!("Failed to serialize request: {e}")))?;

        let response_text = self
            .request_with_retry(|| {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .map_err(RagError::Embedding)?;

        let response: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Embedding(format!("Failed to parse response: {e}")))?;

        debug!("Received embedding with {} dimensions", response.embedding.len());
        Ok(response.embedding)
    }

    /// Send a prompt to the generation model and return its raw text output.
    #[inline]
    pub fn generate(&self, prompt: &str) -> Result<String> {
        debug!("Requesting generation for prompt (length: {})", prompt.len());

        let request = GenerateRequest {
            model: self.generation_model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let url = self
            .base_url
            .join("/api/generate")
            .map_err(|e| RagError::Config(format!("Failed to build generation URL: {e}")))?;

        let request_json = serde_json::to_string(&request)
            .map_err(|e| RagError::Generation(format!("Failed to serialize request: {e}")))?;

        let response_text = self
            .request_with_retry(|| {
                self.agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .map_err(RagError::Generation)?;

        let response: GenerateResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Generation(format!("Failed to parse response: {e}")))?;

        Ok(response.response)
    }

    /// Run a request with bounded exponential-backoff retries.
    ///
    /// Rate-limit responses (429), server errors (5xx) and transport errors
    /// are retried; everything else propagates immediately.
    fn request_with_retry<F>(&self, mut request_fn: F) -> std::result::Result<String, String>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status == 429 || *status >= 500 {
                                warn!(
                                    "Retryable status {}, attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(format!("Client error: HTTP {status}"));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(format!("Non-retryable error: {error}"));
                    }

                    last_error = Some(format!("Request error: {error}"));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        let delay = Duration::from_millis(delay_ms);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| "Request failed after retries".to_string()))
    }
}

/// Remote embedding provider backed by an [`OllamaClient`].
///
/// A response vector whose length differs from the configured dimension is a
/// configuration error and surfaces as `DimensionMismatch`; failures are
/// never papered over with zero or mock vectors.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    dimension: usize,
    max_input_chars: usize,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(client: OllamaClient, dimension: usize, max_input_chars: usize) -> Self {
        Self {
            client,
            dimension,
            max_input_chars,
        }
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let truncated = truncate_chars(text, self.max_input_chars);
        let embedding = self.client.embed(truncated)?;

        if embedding.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }
}
