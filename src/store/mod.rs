// Store module
// One VectorStore abstraction over swappable storage backends: an in-memory
// map for tests/ephemeral use and a durable sqlite engine


pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::{RagError, Result};

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

const MAX_TOP_K: usize = 20;
const COSINE_EPSILON: f64 = 1e-10;

/// A stored document: owner of zero or more chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    pub filename: String,
    pub chunk_count: i64,
    pub created_date: NaiveDateTime,
}

/// A stored chunk with its embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: i64,
    pub document_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub chunk_index: i64,
    pub created_date: NaiveDateTime,
}

/// A chunk row waiting to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub document_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub chunk_index: i64,
}

/// Validated similarity-search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Maximum number of ranked results to return (1..=20).
    pub top_k: usize,
    /// Minimum cosine similarity a candidate must reach (0.0..=1.0).
    pub threshold: f32,
    /// Restrict the search to a single document.
    pub document_id: Option<String>,
}

impl Default for SearchParams {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 3,
            threshold: 0.3,
            document_id: None,
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 || self.top_k > MAX_TOP_K {
            return Err(RagError::InvalidParameters(format!(
                "topK must be between 1 and {MAX_TOP_K}, got {}",
                self.top_k
            )));
        }

        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(RagError::InvalidParameters(format!(
                "threshold must be between 0.0 and 1.0, got {}",
                self.threshold
            )));
        }

        Ok(())
    }
}

/// A search hit: chunk content plus its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub similarity: f32,
}

/// Row-level storage operations shared by every backend.
///
/// Implementations must keep chunk insertion (row + owner counter increment)
/// and document deletion (document + all chunks) atomic, and must return
/// candidate chunks in insertion order so similarity ties rank oldest-first.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn insert_document(&self, document: DocumentRecord) -> Result<()>;

    async fn get_document(&self, document_id: &str) -> Result<Option<DocumentRecord>>;

    /// Insert a chunk and atomically increment the owning document's chunk
    /// counter. Fails with `DocumentNotFound` when the owner is missing and
    /// `InvalidParameters` when the position index is already taken.
    async fn insert_chunk(&self, chunk: NewChunk) -> Result<()>;

    /// All chunks, optionally scoped to one document, in insertion order.
    async fn candidate_chunks(&self, document_id: Option<&str>) -> Result<Vec<ChunkRecord>>;

    /// Remove a document and all of its chunks as one atomic operation.
    /// Returns false when the document does not exist.
    async fn delete_document(&self, document_id: &str) -> Result<bool>;

    async fn clear(&self) -> Result<()>;

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>>;

    async fn total_chunk_count(&self) -> Result<i64>;
}

/// Vector store over a storage backend: owns document/chunk persistence and
/// exact cosine-similarity search with threshold and top-K semantics.
#[derive(Debug, Clone)]
pub struct VectorStore<B> {
    backend: B,
    dimension: usize,
}

impl<B: VectorBackend> VectorStore<B> {
    #[inline]
    pub fn new(backend: B, dimension: usize) -> Self {
        Self { backend, dimension }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Create a new document record with a fresh identifier and a zero chunk
    /// count, returning the identifier.
    #[inline]
    pub async fn create_document(&self, filename: &str) -> Result<String> {
        let document = DocumentRecord {
            id: Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            chunk_count: 0,
            created_date: Utc::now().naive_utc(),
        };
        let id = document.id.clone();

        self.backend.insert_document(document).await?;

        debug!("Created document {} ({})", id, filename);
        Ok(id)
    }

    /// Append a chunk to an existing document. Insertion and the owner's
    /// chunk-count increment happen in one atomic step.
    #[inline]
    pub async fn store(
        &self,
        document_id: &str,
        content: &str,
        embedding: Vec<f32>,
        chunk_index: i64,
    ) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        self.backend
            .insert_chunk(NewChunk {
                document_id: document_id.to_string(),
                content: content.to_string(),
                embedding,
                chunk_index,
            })
            .await?;

        debug!("Stored chunk {} for document {}", chunk_index, document_id);
        Ok(())
    }

    /// Rank stored chunks against a query embedding.
    ///
    /// Full scan over the (optionally document-scoped) candidate set, exact
    /// cosine similarity, threshold filter, stable descending sort (ties keep
    /// insertion order), truncated to `top_k`.
    #[inline]
    pub async fn search(&self, query: &[f32], params: &SearchParams) -> Result<Vec<ScoredChunk>> {
        params.validate()?;

        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if let Some(document_id) = params.document_id.as_deref() {
            if self.backend.get_document(document_id).await?.is_none() {
                return Err(RagError::DocumentNotFound(document_id.to_string()));
            }
        }

        let candidates = self
            .backend
            .candidate_chunks(params.document_id.as_deref())
            .await?;
        let candidate_count = candidates.len();

        let mut scored = Vec::with_capacity(candidate_count);
        for chunk in candidates {
            let similarity = cosine_similarity(query, &chunk.embedding)?;
            if similarity >= params.threshold {
                scored.push(ScoredChunk {
                    document_id: chunk.document_id,
                    chunk_index: chunk.chunk_index,
                    content: chunk.content,
                    similarity,
                });
            }
        }

        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(params.top_k);

        debug!(
            "Search kept {} of {} candidates above threshold {}",
            scored.len(),
            candidate_count,
            params.threshold
        );

        Ok(scored)
    }

    /// Remove a document and all of its chunks atomically.
    #[inline]
    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        if !self.backend.delete_document(document_id).await? {
            return Err(RagError::DocumentNotFound(document_id.to_string()));
        }

        debug!("Deleted document {}", document_id);
        Ok(())
    }

    /// Remove every document and chunk.
    #[inline]
    pub async fn clear_all(&self) -> Result<()> {
        self.backend.clear().await
    }

    #[inline]
    pub async fn exists(&self, document_id: &str) -> Result<bool> {
        Ok(self.backend.get_document(document_id).await?.is_some())
    }

    #[inline]
    pub async fn get_document(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        self.backend.get_document(document_id).await
    }

    /// Chunk count for one document; `DocumentNotFound` when it is absent.
    #[inline]
    pub async fn chunk_count(&self, document_id: &str) -> Result<i64> {
        self.backend
            .get_document(document_id)
            .await?
            .map(|document| document.chunk_count)
            .ok_or_else(|| RagError::DocumentNotFound(document_id.to_string()))
    }

    #[inline]
    pub async fn total_chunk_count(&self) -> Result<i64> {
        self.backend.total_chunk_count().await
    }

    #[inline]
    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        self.backend.list_documents().await
    }
}

/// Exact cosine similarity `dot(a, b) / (|a| * |b| + epsilon)`.
///
/// Accumulates in f64 so ranking is stable for long vectors. Mismatched
/// lengths signal a configuration problem and are always fatal.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(RagError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt() + COSINE_EPSILON);
    Ok(similarity as f32)
}
