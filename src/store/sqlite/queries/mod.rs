
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::store::NewChunk;
use crate::store::sqlite::models::{ChunkRow, DocumentRow, encode_embedding};
use crate::{RagError, Result};

pub struct DocumentQueries;

impl DocumentQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, row: DocumentRow) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (id, filename, chunk_count, created_date) VALUES (?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.filename)
        .bind(row.chunk_count)
        .bind(row.created_date)
        .execute(pool)
        .await
        .map_err(|e| RagError::Storage(format!("Failed to create document: {e}")))?;

        Ok(())
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, document_id: &str) -> Result<Option<DocumentRow>> {
        sqlx::query_as::<_, DocumentRow>(
            "SELECT id, filename, chunk_count, created_date FROM documents WHERE id = ?",
        )
        .bind(document_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| RagError::Storage(format!("Failed to get document: {e}")))
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<DocumentRow>> {
        sqlx::query_as::<_, DocumentRow>(
            "SELECT id, filename, chunk_count, created_date FROM documents ORDER BY created_date, id",
        )
        .fetch_all(pool)
        .await
        .map_err(|e| RagError::Storage(format!("Failed to list documents: {e}")))
    }

    /// Delete a document and its chunks in one transaction. Returns false
    /// when the document does not exist.
    #[inline]
    pub async fn delete(pool: &SqlitePool, document_id: &str) -> Result<bool> {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to begin transaction: {e}")))?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RagError::Storage(format!("Failed to delete chunks: {e}")))?;

        let deleted = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RagError::Storage(format!("Failed to delete document: {e}")))?
            .rows_affected();

        tx.commit()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to commit delete: {e}")))?;

        Ok(deleted > 0)
    }

    #[inline]
    pub async fn clear(pool: &SqlitePool) -> Result<()> {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to begin transaction: {e}")))?;

        sqlx::query("DELETE FROM chunks")
            .execute(&mut *tx)
            .await
            .map_err(|e| RagError::Storage(format!("Failed to clear chunks: {e}")))?;

        sqlx::query("DELETE FROM documents")
            .execute(&mut *tx)
            .await
            .map_err(|e| RagError::Storage(format!("Failed to clear documents: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to commit clear: {e}")))?;

        Ok(())
    }
}

pub struct ChunkQueries;

impl ChunkQueries {
    /// Insert a chunk and bump the owner's chunk counter in one transaction.
    ///
    /// The counter update runs as `chunk_count = chunk_count + 1` inside the
    /// database, never as a read-modify-write of a cached value, so counts
    /// survive concurrent stores. The transaction opens with the insert
    /// itself so concurrent writers queue on the write lock instead of
    /// failing a read-to-write upgrade; a missing owner inside the
    /// transaction surfaces through the foreign key constraint.
    #[inline]
    pub async fn insert(pool: &SqlitePool, chunk: NewChunk) -> Result<()> {
        let owner_exists = sqlx::query("SELECT 1 FROM documents WHERE id = ?")
            .bind(&chunk.document_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| RagError::Storage(format!("Failed to check document: {e}")))?
            .is_some();

        if !owner_exists {
            return Err(RagError::DocumentNotFound(chunk.document_id));
        }

        let embedding = encode_embedding(&chunk.embedding);
        let now = Utc::now().naive_utc();

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to begin transaction: {e}")))?;

        sqlx::query(
            "INSERT INTO chunks (document_id, content, embedding, chunk_index, created_date) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&chunk.document_id)
        .bind(&chunk.content)
        .bind(embedding)
        .bind(chunk.chunk_index)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RagError::InvalidParameters(format!(
                    "Chunk index {} already exists for document {}",
                    chunk.chunk_index, chunk.document_id
                ))
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                RagError::DocumentNotFound(chunk.document_id.clone())
            }
            _ => RagError::Storage(format!("Failed to insert chunk: {e}")),
        })?;

        sqlx::query("UPDATE documents SET chunk_count = chunk_count + 1 WHERE id = ?")
            .bind(&chunk.document_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RagError::Storage(format!("Failed to update chunk count: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| RagError::Storage(format!("Failed to commit chunk insert: {e}")))?;

        debug!(
            "Inserted chunk {} for document {}",
            chunk.chunk_index, chunk.document_id
        );
        Ok(())
    }

    /// All chunk rows, optionally scoped to a document, in insertion order.
    #[inline]
    pub async fn list(pool: &SqlitePool, document_id: Option<&str>) -> Result<Vec<ChunkRow>> {
        let rows = match document_id {
            Some(document_id) => {
                sqlx::query_as::<_, ChunkRow>(
                    "SELECT id, document_id, content, embedding, chunk_index, created_date \
                     FROM chunks WHERE document_id = ? ORDER BY id",
                )
                .bind(document_id)
                .fetch_all(pool)
                .await
            }
            None => {
                sqlx::query_as::<_, ChunkRow>(
                    "SELECT id, document_id, content, embedding, chunk_index, created_date \
                     FROM chunks ORDER BY id",
                )
                .fetch_all(pool)
                .await
            }
        };

        rows.map_err(|e| RagError::Storage(format!("Failed to list chunks: {e}")))
    }

    #[inline]
    pub async fn count_all(pool: &SqlitePool) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chunks")
            .fetch_one(pool)
            .await
            .map_err(|e| RagError::Storage(format!("Failed to count chunks: {e}")))?;

        Ok(count.0)
    }
}
