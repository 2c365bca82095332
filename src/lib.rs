use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Document produced no chunks")]
    EmptyDocument,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chunking;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod rag;
pub mod store;
