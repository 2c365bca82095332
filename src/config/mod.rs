
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::chunking::ChunkingConfig;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;
pub const DEFAULT_MAX_INPUT_CHARS: usize = 8000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Which embedding implementation the process uses. Selected once at startup;
/// nothing downstream branches on the concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Local,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub dimension: u32,
    pub max_input_chars: usize,
}

impl Default for EmbeddingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Local,
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub generation_model: String,
}

impl Default for OllamaConfig {
    #[inline]
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "nomic-embed-text:latest".to_string(),
            generation_model: "llama3.1:8b".to_string(),
        }
    }
}

/// Default search policy. Tune here rather than in code when
/// recall/precision trade-offs change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub default_top_k: usize,
    pub default_threshold: f32,
}

impl Default for SearchConfig {
    #[inline]
    fn default() -> Self {
        Self {
            default_top_k: 3,
            default_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestionConfig {
    /// Bounded worker count for per-chunk embed+store during ingestion.
    pub workers: usize,
}

impl Default for IngestionConfig {
    #[inline]
    fn default() -> Self {
        Self { workers: 4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
}

impl Default for StorageConfig {
    #[inline]
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Sqlite,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid max input chars: {0} (must be between 1 and 100000)")]
    InvalidMaxInputChars(usize),
    #[error("Invalid chunk size: {0} (must be positive)")]
    InvalidChunkSize(usize),
    #[error("Overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid default topK: {0} (must be between 1 and 20)")]
    InvalidTopK(usize),
    #[error("Invalid default threshold: {0} (must be between 0.0 and 1.0)")]
    InvalidThreshold(f32),
    #[error("Invalid worker count: {0} (must be between 1 and 64)")]
    InvalidWorkers(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.base_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;

        if !(64..=4096).contains(&self.embedding.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding.dimension,
            ));
        }

        if self.embedding.max_input_chars == 0 || self.embedding.max_input_chars > 100_000 {
            return Err(ConfigError::InvalidMaxInputChars(
                self.embedding.max_input_chars,
            ));
        }

        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunking.chunk_size));
        }

        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunking.overlap,
                self.chunking.chunk_size,
            ));
        }

        if !(1..=20).contains(&self.search.default_top_k) {
            return Err(ConfigError::InvalidTopK(self.search.default_top_k));
        }

        if !(0.0..=1.0).contains(&self.search.default_threshold) {
            return Err(ConfigError::InvalidThreshold(self.search.default_threshold));
        }

        if !(1..=64).contains(&self.ingestion.workers) {
            return Err(ConfigError::InvalidWorkers(self.ingestion.workers));
        }

        Ok(())
    }

    /// Get the path for the SQLite database.
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.base_dir.join("ragpipe.db")
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            ollama: OllamaConfig::default(),
            chunking: ChunkingConfig::default(),
            search: SearchConfig::default(),
            ingestion: IngestionConfig::default(),
            storage: StorageConfig::default(),
            base_dir: PathBuf::new(),
        }
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        self.url()?;

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.generation_model.clone()));
        }

        Ok(())
    }

    pub fn url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

/// Default configuration directory for the current user.
#[inline]
pub fn get_config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or(ConfigError::DirectoryError)?;
    Ok(base.join("ragpipe"))
}
