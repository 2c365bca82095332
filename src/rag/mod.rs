// Rag module
// Ties the pipeline together: chunk, embed and store on ingestion; retrieve,
// assemble context and generate on questions


use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use itertools::Itertools;
use tokio::task;
use tracing::{debug, info, warn};

use crate::chunking::{self, ChunkingConfig};
use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::generation::GenerationProvider;
use crate::store::{DocumentRecord, ScoredChunk, SearchParams, VectorBackend, VectorStore};
use crate::{RagError, Result};

/// Canned answer returned when retrieval produces no context. The generator
/// is never called in that case.
pub const NO_CONTEXT_ANSWER: &str = "No relevant information found in the document(s). \
    The question may not be related to the uploaded content, or the similarity threshold \
    may be too high.";

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub document_id: String,
    pub chunk_count: usize,
}

/// A generated answer plus the retrieved chunks it was grounded on.
/// `sources` is empty exactly when the canned no-context answer was returned.
/// The resolved search parameters are echoed back so callers can see which
/// scope, top-k and threshold actually applied; `document_id` is `None` when
/// the question ran against all documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub document_id: Option<String>,
    pub top_k: usize,
    pub threshold: f32,
    pub sources: Vec<ScoredChunk>,
}

/// Per-question overrides; unset fields fall back to the configured defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AskOptions {
    pub top_k: Option<usize>,
    pub threshold: Option<f32>,
    pub document_id: Option<String>,
}

/// Store totals for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStatus {
    pub document_count: usize,
    pub chunk_count: i64,
}

/// Embeds questions and ranks stored chunks against them.
pub struct Retriever<B> {
    store: VectorStore<B>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl<B: VectorBackend> Retriever<B> {
    #[inline]
    pub fn new(store: VectorStore<B>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    #[inline]
    pub fn store(&self) -> &VectorStore<B> {
        &self.store
    }

    /// Embed on a blocking worker thread; providers do synchronous HTTP.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let input = text.to_string();

        task::spawn_blocking(move || embedder.embed(&input))
            .await
            .map_err(|e| RagError::Embedding(format!("Embedding task failed: {e}")))?
    }

    /// Embed the question and return the ranked chunks above threshold.
    pub async fn retrieve(&self, question: &str, params: &SearchParams) -> Result<Vec<ScoredChunk>> {
        let query = self.embed(question).await?;
        self.store.search(&query, params).await
    }
}

/// The full ingestion-and-question pipeline over one vector store.
pub struct RagPipeline<B> {
    retriever: Retriever<B>,
    generator: Arc<dyn GenerationProvider>,
    chunking: ChunkingConfig,
    defaults: SearchParams,
    workers: usize,
}

impl<B: VectorBackend> RagPipeline<B> {
    /// Assemble the pipeline. Fails when the embedding provider's dimension
    /// disagrees with the store's.
    pub fn new(
        store: VectorStore<B>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        config: &Config,
    ) -> Result<Self> {
        if embedder.dimension() != store.dimension() {
            return Err(RagError::Config(format!(
                "Embedding provider produces {}-dimension vectors but the store expects {}",
                embedder.dimension(),
                store.dimension()
            )));
        }

        Ok(Self {
            retriever: Retriever::new(store, embedder),
            generator,
            chunking: config.chunking.clone(),
            defaults: SearchParams {
                top_k: config.search.default_top_k,
                threshold: config.search.default_threshold,
                document_id: None,
            },
            workers: config.ingestion.workers.max(1),
        })
    }

    #[inline]
    pub fn store(&self) -> &VectorStore<B> {
        self.retriever.store()
    }

    /// Ingest one document: chunk the text, embed every chunk, and store the
    /// chunks under a fresh document id.
    ///
    /// Embedding runs on up to `workers` blocking tasks at a time; chunks are
    /// stored in position order as their embeddings complete. When any chunk
    /// fails, the partly ingested document is deleted so no half-stored
    /// document is ever searchable.
    pub async fn ingest_text(&self, filename: &str, text: &str) -> Result<IngestReport> {
        if text.trim().is_empty() {
            return Err(RagError::EmptyDocument);
        }

        let chunks = chunking::chunk_with_config(text, &self.chunking)?;
        if chunks.is_empty() {
            return Err(RagError::EmptyDocument);
        }

        let chunk_count = chunks.len();
        let document_id = self.store().create_document(filename).await?;

        match self.embed_and_store(&document_id, chunks).await {
            Ok(()) => {
                info!(
                    "Ingested document {} ({}) with {} chunks",
                    document_id, filename, chunk_count
                );
                Ok(IngestReport {
                    document_id,
                    chunk_count,
                })
            }
            Err(e) => {
                if let Err(cleanup_err) = self.store().delete_document(&document_id).await {
                    warn!(
                        "Failed to clean up document {} after ingestion error: {}",
                        document_id, cleanup_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn embed_and_store(&self, document_id: &str, chunks: Vec<String>) -> Result<()> {
        let embedder = &self.retriever.embedder;

        // `buffered` keeps completion in position order, so insertion order in
        // the store matches chunk order.
        let mut embedded = stream::iter(chunks.into_iter().enumerate().map(|(index, content)| {
            let embedder = Arc::clone(embedder);
            async move {
                let input = content.clone();
                let embedding = task::spawn_blocking(move || embedder.embed(&input))
                    .await
                    .map_err(|e| RagError::Embedding(format!("Embedding task failed: {e}")))??;
                Ok::<_, RagError>((index, content, embedding))
            }
        }))
        .buffered(self.workers);

        while let Some(result) = embedded.next().await {
            let (index, content, embedding) = result?;
            self.store()
                .store(document_id, &content, embedding, index as i64)
                .await?;
        }

        Ok(())
    }

    /// Answer a question from stored context.
    ///
    /// Validates the question and parameters, retrieves the ranked chunks,
    /// and forwards the assembled prompt to the generator. When retrieval
    /// comes back empty the canned no-context answer is returned instead and
    /// the generator is not consulted.
    pub async fn ask(&self, question: &str, options: &AskOptions) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidInput(
                "Question cannot be empty".to_string(),
            ));
        }

        let params = self.search_params(options);
        params.validate()?;

        // Reject an unknown document scope before paying for an embedding.
        if let Some(document_id) = params.document_id.as_deref() {
            if !self.store().exists(document_id).await? {
                return Err(RagError::DocumentNotFound(document_id.to_string()));
            }
        }

        let sources = self.retriever.retrieve(question, &params).await?;

        if sources.is_empty() {
            debug!("No chunks above threshold {}", params.threshold);
            return Ok(Answer {
                text: NO_CONTEXT_ANSWER.to_string(),
                document_id: params.document_id,
                top_k: params.top_k,
                threshold: params.threshold,
                sources,
            });
        }

        let context = sources.iter().map(|chunk| chunk.content.as_str()).join("\n\n");
        let prompt = build_prompt(question, &context);

        let generator = Arc::clone(&self.generator);
        let text = task::spawn_blocking(move || generator.generate(&prompt))
            .await
            .map_err(|e| RagError::Generation(format!("Generation task failed: {e}")))??;

        debug!("Generated answer from {} source chunks", sources.len());
        Ok(Answer {
            text,
            document_id: params.document_id,
            top_k: params.top_k,
            threshold: params.threshold,
            sources,
        })
    }

    /// Delete one document and its chunks.
    #[inline]
    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        self.store().delete_document(document_id).await
    }

    /// All stored documents, oldest first.
    #[inline]
    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        self.store().list_documents().await
    }

    /// Metadata for one document; `DocumentNotFound` when it is absent.
    pub async fn document_info(&self, document_id: &str) -> Result<DocumentRecord> {
        self.store()
            .get_document(document_id)
            .await?
            .ok_or_else(|| RagError::DocumentNotFound(document_id.to_string()))
    }

    /// Remove every document and chunk.
    #[inline]
    pub async fn clear_all(&self) -> Result<()> {
        self.store().clear_all().await
    }

    /// Document and chunk totals.
    pub async fn status(&self) -> Result<StoreStatus> {
        let documents = self.store().list_documents().await?;
        let chunk_count = self.store().total_chunk_count().await?;

        Ok(StoreStatus {
            document_count: documents.len(),
            chunk_count,
        })
    }

    fn search_params(&self, options: &AskOptions) -> SearchParams {
        SearchParams {
            top_k: options.top_k.unwrap_or(self.defaults.top_k),
            threshold: options.threshold.unwrap_or(self.defaults.threshold),
            document_id: options.document_id.clone(),
        }
    }
}

/// Grounding prompt: retrieved context first, then the question, then the
/// instructions that pin the answer to the context.
fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a helpful assistant that answers questions based on the provided context.\n\n\
         Context:\n{context}\n\n\
         Question: {question}\n\n\
         Instructions:\n\
         - Answer the question based ONLY on the information provided in the context above.\n\
         - If the context doesn't contain enough information to answer the question, say so.\n\
         - Be concise and accurate.\n\
         - Do not make up information that is not in the context.\n\n\
         Answer:"
    )
}
