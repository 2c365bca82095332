use anyhow::{Context, Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tokio::task;
use tracing::info;

use crate::config::{Config, EmbeddingProviderKind, StorageBackendKind, get_config_dir};
use crate::embeddings::{OllamaClient, provider_from_config};
use crate::generation::generator_from_config;
use crate::rag::{AskOptions, RagPipeline};
use crate::store::{SqliteBackend, VectorStore};

/// Build the pipeline from a loaded configuration.
///
/// The CLI always runs on the sqlite backend; the memory backend cannot carry
/// state between invocations.
pub async fn build_pipeline(config: &Config) -> Result<RagPipeline<SqliteBackend>> {
    if config.storage.backend == StorageBackendKind::Memory {
        bail!(
            "The memory storage backend does not persist between runs; \
             set storage.backend to \"sqlite\" to use the CLI"
        );
    }

    if !config.base_dir.as_os_str().is_empty() {
        std::fs::create_dir_all(&config.base_dir).with_context(|| {
            format!(
                "Failed to create data directory: {}",
                config.base_dir.display()
            )
        })?;
    }

    let dimension = config.embedding.dimension as usize;
    let backend = SqliteBackend::connect(config.database_path(), dimension)
        .await
        .context("Failed to open database")?;

    let store = VectorStore::new(backend, dimension);
    let embedder = provider_from_config(config)?;
    let generator = generator_from_config(config)?;

    Ok(RagPipeline::new(store, embedder, generator, config)?)
}

async fn open_pipeline() -> Result<RagPipeline<SqliteBackend>> {
    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir)?;
    build_pipeline(&config).await
}

fn spinner(message: &'static str) -> ProgressBar {
    if console::user_attended_stderr() {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("style template is valid"),
        );
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    } else {
        ProgressBar::hidden()
    }
}

/// Ingest a text file as a new document
#[inline]
pub async fn ingest_file(path: &Path) -> Result<()> {
    let rag = open_pipeline().await?;

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("document.txt")
        .to_string();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    info!("Ingesting {}", path.display());

    let bar = spinner("Chunking and embedding...");
    let report = rag.ingest_text(&filename, &text).await;
    bar.finish_and_clear();
    let report = report?;

    println!(
        "Ingested {} as document {}",
        style(&filename).cyan(),
        style(&report.document_id).green()
    );
    println!("  Chunks stored: {}", report.chunk_count);

    Ok(())
}

/// Answer a question from the ingested documents
#[inline]
pub async fn ask(
    question: &str,
    top_k: Option<usize>,
    threshold: Option<f32>,
    document_id: Option<String>,
) -> Result<()> {
    let rag = open_pipeline().await?;

    let options = AskOptions {
        top_k,
        threshold,
        document_id,
    };

    let bar = spinner("Retrieving and generating...");
    let answer = rag.ask(question, &options).await;
    bar.finish_and_clear();
    let answer = answer?;

    println!("{}", answer.text);

    println!();
    println!(
        "{}",
        style(format!(
            "Searched {} (topK {}, threshold {})",
            answer
                .document_id
                .as_deref()
                .map_or_else(|| "all documents".to_string(), |id| format!("document {id}")),
            answer.top_k,
            answer.threshold
        ))
        .dim()
    );

    if !answer.sources.is_empty() {
        println!();
        println!(
            "{}",
            style(format!("Sources ({} chunks):", answer.sources.len())).dim()
        );
        for source in &answer.sources {
            println!(
                "{}",
                style(format!(
                    "  {} chunk {} (similarity {:.3})",
                    source.document_id, source.chunk_index, source.similarity
                ))
                .dim()
            );
        }
    }

    Ok(())
}

/// List all ingested documents
#[inline]
pub async fn list_documents() -> Result<()> {
    let rag = open_pipeline().await?;
    let documents = rag.list_documents().await?;

    if documents.is_empty() {
        println!("No documents have been ingested yet.");
        println!("Use 'ragpipe ingest <file>' to add one.");
        return Ok(());
    }

    println!("Documents ({} total):", documents.len());
    println!();

    for document in &documents {
        println!("📄 {} (ID: {})", document.filename, document.id);
        println!("   Chunks: {}", document.chunk_count);
        println!(
            "   Added: {}",
            document.created_date.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

/// Show details for one document
#[inline]
pub async fn document_info(document_id: &str) -> Result<()> {
    let rag = open_pipeline().await?;
    let document = rag.document_info(document_id).await?;

    println!("📄 {}", style(&document.filename).cyan());
    println!("   ID: {}", document.id);
    println!("   Chunks: {}", document.chunk_count);
    println!(
        "   Added: {}",
        document.created_date.format("%Y-%m-%d %H:%M:%S")
    );

    Ok(())
}

/// Delete a document and its chunks
#[inline]
pub async fn delete_document(document_id: &str) -> Result<()> {
    let rag = open_pipeline().await?;

    rag.delete_document(document_id).await?;
    println!("Deleted document {}", style(document_id).green());

    Ok(())
}

/// Remove every document and chunk
#[inline]
pub async fn clear_documents(yes: bool) -> Result<()> {
    if !yes {
        bail!("This deletes every ingested document; pass --yes to confirm");
    }

    let rag = open_pipeline().await?;
    let status = rag.status().await?;

    rag.clear_all().await?;
    println!(
        "Cleared {} documents ({} chunks)",
        status.document_count, status.chunk_count
    );

    Ok(())
}

/// Show store totals and provider connectivity
#[inline]
pub async fn show_status() -> Result<()> {
    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir)?;
    let rag = build_pipeline(&config).await?;

    let status = rag.status().await?;

    println!("{}", style("📊 Store Status").bold().cyan());
    println!("  Documents: {}", status.document_count);
    println!("  Chunks: {}", status.chunk_count);
    println!("  Database: {}", config.database_path().display());

    println!();
    println!("{}", style("Providers:").bold().yellow());
    println!(
        "  Embedding: {} ({} dimensions)",
        match config.embedding.provider {
            EmbeddingProviderKind::Local => "local",
            EmbeddingProviderKind::Ollama => "ollama",
        },
        config.embedding.dimension
    );
    println!("  Generation: ollama ({})", config.ollama.generation_model);

    let client = OllamaClient::new(&config.ollama)?;
    let ping = task::spawn_blocking(move || client.ping())
        .await
        .context("Connectivity check task failed")?;
    match ping {
        Ok(()) => println!("  Ollama: {}", style("reachable").green()),
        Err(e) => println!("  Ollama: {} ({e})", style("unreachable").red()),
    }

    Ok(())
}

/// Print the active configuration
#[inline]
pub fn show_config() -> Result<()> {
    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir).context("Failed to load configuration")?;

    println!("{}", style("📋 Current Configuration").bold().cyan());
    println!();

    println!("{}", style("Embedding:").bold().yellow());
    println!(
        "  Provider: {}",
        style(match config.embedding.provider {
            EmbeddingProviderKind::Local => "local",
            EmbeddingProviderKind::Ollama => "ollama",
        })
        .cyan()
    );
    println!("  Dimension: {}", style(config.embedding.dimension).cyan());
    println!(
        "  Max input chars: {}",
        style(config.embedding.max_input_chars).cyan()
    );

    println!();
    println!("{}", style("Ollama:").bold().yellow());
    println!("  Host: {}", style(&config.ollama.host).cyan());
    println!("  Port: {}", style(config.ollama.port).cyan());
    println!(
        "  Embedding model: {}",
        style(&config.ollama.embedding_model).cyan()
    );
    println!(
        "  Generation model: {}",
        style(&config.ollama.generation_model).cyan()
    );
    match config.ollama.url() {
        Ok(url) => println!("  URL: {}", style(url).cyan()),
        Err(e) => println!("  URL: {} ({})", style("Invalid").red(), e),
    }

    println!();
    println!("{}", style("Chunking:").bold().yellow());
    println!(
        "  Chunk size: {}",
        style(config.chunking.chunk_size).cyan()
    );
    println!("  Overlap: {}", style(config.chunking.overlap).cyan());

    println!();
    println!("{}", style("Search:").bold().yellow());
    println!(
        "  Default topK: {}",
        style(config.search.default_top_k).cyan()
    );
    println!(
        "  Default threshold: {}",
        style(config.search.default_threshold).cyan()
    );

    println!();
    println!("{}", style("Ingestion:").bold().yellow());
    println!("  Workers: {}", style(config.ingestion.workers).cyan());

    println!();
    println!(
        "Config file: {}",
        style(config_dir.join("config.toml").display()).dim()
    );

    Ok(())
}
