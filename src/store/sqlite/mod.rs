#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info};

use crate::store::sqlite::models::DocumentRow;
use crate::store::sqlite::queries::{ChunkQueries, DocumentQueries};
use crate::store::{ChunkRecord, DocumentRecord, NewChunk, VectorBackend};
use crate::{RagError, Result};

pub type DbPool = Pool<Sqlite>;

/// Durable storage backend on SQLite.
///
/// Chunk insertion and document deletion run inside transactions, so the
/// chunk-count invariant and delete atomicity hold under concurrent access.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: DbPool,
    dimension: usize,
}

impl SqliteBackend {
    /// Open (creating if missing) the database at `database_path` and run
    /// migrations.
    #[inline]
    pub async fn connect<P: AsRef<Path>>(database_path: P, dimension: usize) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(|e| RagError::Storage(format!("Failed to create connection pool: {e}")))?;

        let backend = Self { pool, dimension };
        backend.run_migrations().await?;

        Ok(backend)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/store/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RagError::Storage(format!("Failed to run schema migration: {e}")))?;

        debug!("Database migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl VectorBackend for SqliteBackend {
    async fn insert_document(&self, document: DocumentRecord) -> Result<()> {
        DocumentQueries::create(
            &self.pool,
            DocumentRow {
                id: document.id,
                filename: document.filename,
                chunk_count: document.chunk_count,
                created_date: document.created_date,
            },
        )
        .await
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        let row = DocumentQueries::get_by_id(&self.pool, document_id).await?;
        Ok(row.map(DocumentRecord::from))
    }

    async fn insert_chunk(&self, chunk: NewChunk) -> Result<()> {
        ChunkQueries::insert(&self.pool, chunk).await
    }

    async fn candidate_chunks(&self, document_id: Option<&str>) -> Result<Vec<ChunkRecord>> {
        let rows = ChunkQueries::list(&self.pool, document_id).await?;

        rows.into_iter()
            .map(|row| row.into_record(self.dimension))
            .collect()
    }

    async fn delete_document(&self, document_id: &str) -> Result<bool> {
        DocumentQueries::delete(&self.pool, document_id).await
    }

    async fn clear(&self) -> Result<()> {
        DocumentQueries::clear(&self.pool).await
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let rows = DocumentQueries::list_all(&self.pool).await?;
        Ok(rows.into_iter().map(DocumentRecord::from).collect())
    }

    async fn total_chunk_count(&self) -> Result<i64> {
        ChunkQueries::count_all(&self.pool).await
    }
}
