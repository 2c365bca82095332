
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::store::{ChunkRecord, DocumentRecord};
use crate::{RagError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DocumentRow {
    pub id: String,
    pub filename: String,
    pub chunk_count: i64,
    pub created_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChunkRow {
    pub id: i64,
    pub document_id: String,
    pub content: String,
    pub embedding: Vec<u8>,
    pub chunk_index: i64,
    pub created_date: NaiveDateTime,
}

impl From<DocumentRow> for DocumentRecord {
    #[inline]
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id,
            filename: row.filename,
            chunk_count: row.chunk_count,
            created_date: row.created_date,
        }
    }
}

impl ChunkRow {
    /// Decode the persisted embedding blob, checking it still matches the
    /// configured dimension.
    #[inline]
    pub fn into_record(self, dimension: usize) -> Result<ChunkRecord> {
        let embedding = decode_embedding(&self.embedding)?;

        if embedding.len() != dimension {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: embedding.len(),
            });
        }

        Ok(ChunkRecord {
            id: self.id,
            document_id: self.document_id,
            content: self.content,
            embedding,
            chunk_index: self.chunk_index,
            created_date: self.created_date,
        })
    }
}

/// Serialize an embedding as little-endian f32 bytes.
#[inline]
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Deserialize a little-endian f32 blob back into an embedding.
#[inline]
pub fn decode_embedding(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(RagError::Storage(format!(
            "Embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
