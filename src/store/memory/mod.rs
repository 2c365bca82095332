
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::{ChunkRecord, DocumentRecord, NewChunk, VectorBackend};
use crate::{RagError, Result};

/// In-memory storage backend.
///
/// A single RwLock guards both tables, so deletion is atomic with respect to
/// concurrent scoped searches: a reader sees the whole document or none of
/// it. Surrogate chunk ids increase monotonically, which doubles as the
/// insertion order the ranking layer relies on for ties.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: HashMap<String, DocumentRecord>,
    chunks: Vec<ChunkRecord>,
    next_chunk_id: i64,
}

impl MemoryBackend {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorBackend for MemoryBackend {
    async fn insert_document(&self, document: DocumentRecord) -> Result<()> {
        let mut state = self.state.write().await;

        if state.documents.contains_key(&document.id) {
            return Err(RagError::Storage(format!(
                "Document {} already exists",
                document.id
            )));
        }

        state.documents.insert(document.id.clone(), document);
        Ok(())
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        let state = self.state.read().await;
        Ok(state.documents.get(document_id).cloned())
    }

    async fn insert_chunk(&self, chunk: NewChunk) -> Result<()> {
        let mut state = self.state.write().await;

        if !state.documents.contains_key(&chunk.document_id) {
            return Err(RagError::DocumentNotFound(chunk.document_id));
        }

        let duplicate = state
            .chunks
            .iter()
            .any(|c| c.document_id == chunk.document_id && c.chunk_index == chunk.chunk_index);
        if duplicate {
            return Err(RagError::InvalidParameters(format!(
                "Chunk index {} already exists for document {}",
                chunk.chunk_index, chunk.document_id
            )));
        }

        state.next_chunk_id += 1;
        let record = ChunkRecord {
            id: state.next_chunk_id,
            document_id: chunk.document_id.clone(),
            content: chunk.content,
            embedding: chunk.embedding,
            chunk_index: chunk.chunk_index,
            created_date: chrono::Utc::now().naive_utc(),
        };
        state.chunks.push(record);

        // Same write-lock section as the insert, so the counter can never
        // drift from the chunk rows.
        if let Some(document) = state.documents.get_mut(&chunk.document_id) {
            document.chunk_count += 1;
        }

        Ok(())
    }

    async fn candidate_chunks(&self, document_id: Option<&str>) -> Result<Vec<ChunkRecord>> {
        let state = self.state.read().await;

        let chunks = state
            .chunks
            .iter()
            .filter(|chunk| document_id.is_none_or(|id| chunk.document_id == id))
            .cloned()
            .collect();

        Ok(chunks)
    }

    async fn delete_document(&self, document_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;

        if state.documents.remove(document_id).is_none() {
            return Ok(false);
        }

        state.chunks.retain(|chunk| chunk.document_id != document_id);
        Ok(true)
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.documents.clear();
        state.chunks.clear();
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let state = self.state.read().await;

        let mut documents: Vec<DocumentRecord> = state.documents.values().cloned().collect();
        documents.sort_by(|a, b| a.created_date.cmp(&b.created_date).then(a.id.cmp(&b.id)));

        Ok(documents)
    }

    async fn total_chunk_count(&self) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state.chunks.len() as i64)
    }
}
