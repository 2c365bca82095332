use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ragpipe::commands::{
    ask, clear_documents, delete_document, document_info, ingest_file, list_documents,
    show_config, show_status,
};

#[derive(Parser)]
#[command(name = "ragpipe")]
#[command(about = "Retrieval-augmented question answering over local documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a text file: chunk it, embed the chunks and store them
    Ingest {
        /// Path to the text file to ingest
        file: PathBuf,
    },
    /// Ask a question over the ingested documents
    Ask {
        /// The question to answer
        question: String,
        /// Maximum number of chunks to retrieve (1-20)
        #[arg(long)]
        top_k: Option<usize>,
        /// Minimum similarity a chunk must reach (0.0-1.0)
        #[arg(long)]
        threshold: Option<f32>,
        /// Restrict retrieval to a single document ID
        #[arg(long)]
        document: Option<String>,
    },
    /// List all ingested documents
    List,
    /// Show details for one document
    Info {
        /// Document ID
        document: String,
    },
    /// Delete a document and its chunks
    Delete {
        /// Document ID to delete
        document: String,
    },
    /// Delete every document and chunk
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Show store totals and provider connectivity
    Status,
    /// Show the active configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { file } => {
            ingest_file(&file).await?;
        }
        Commands::Ask {
            question,
            top_k,
            threshold,
            document,
        } => {
            ask(&question, top_k, threshold, document).await?;
        }
        Commands::List => {
            list_documents().await?;
        }
        Commands::Info { document } => {
            document_info(&document).await?;
        }
        Commands::Delete { document } => {
            delete_document(&document).await?;
        }
        Commands::Clear { yes } => {
            clear_documents(yes).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
        Commands::Config => {
            show_config()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["ragpipe", "list"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::List);
        }
    }

    #[test]
    fn ingest_command_with_file() {
        let cli = Cli::try_parse_from(["ragpipe", "ingest", "notes.txt"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest { file } = parsed.command {
                assert_eq!(file, PathBuf::from("notes.txt"));
            }
        }
    }

    #[test]
    fn ask_command_with_defaults() {
        let cli = Cli::try_parse_from(["ragpipe", "ask", "What is a cat?"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask {
                question,
                top_k,
                threshold,
                document,
            } = parsed.command
            {
                assert_eq!(question, "What is a cat?");
                assert_eq!(top_k, None);
                assert_eq!(threshold, None);
                assert_eq!(document, None);
            }
        }
    }

    #[test]
    fn ask_command_with_overrides() {
        let cli = Cli::try_parse_from([
            "ragpipe",
            "ask",
            "What is a cat?",
            "--top-k",
            "5",
            "--threshold",
            "0.5",
            "--document",
            "doc-1",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask {
                top_k,
                threshold,
                document,
                ..
            } = parsed.command
            {
                assert_eq!(top_k, Some(5));
                assert_eq!(threshold, Some(0.5));
                assert_eq!(document, Some("doc-1".to_string()));
            }
        }
    }

    #[test]
    fn clear_requires_explicit_flag_to_parse_confirmed() {
        let cli = Cli::try_parse_from(["ragpipe", "clear"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Clear { yes } = parsed.command {
                assert!(!yes);
            }
        }

        let cli = Cli::try_parse_from(["ragpipe", "clear", "--yes"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Clear { yes } = parsed.command {
                assert!(yes);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["ragpipe", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["ragpipe", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
