//! # docmind CLI
//!
//! The `docmind` binary is the external contract consumed by the web
//! layer: each invocation is an isolated batch process that performs one
//! operation and writes exactly one JSON value as the final line of
//! standard output. Diagnostic output goes to standard error; the caller
//! parses only the last non-empty stdout line.
//!
//! ## Commands
//!
//! | Command | Final stdout line |
//! |---------|-------------------|
//! | `docmind ingest <path1> [path2 ...]` | JSON array, one result per path, in input order |
//! | `docmind chat --query <text> [--filter <json-or-id>] [--history <json>]` | JSON object with `status` and `answer`/`message` |
//! | `docmind delete <source-id>` | JSON object with the removed chunk count |
//! | `docmind status` | JSON object with index row counts |
//!
//! Exit code is 0 on successful dispatch even when the operation result
//! reports a logical failure (e.g. one file failed to ingest); non-zero
//! only for uncaught failures such as an unusable index.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docmind::answer::{self, ChatRequest};
use docmind::config;
use docmind::index::Index;
use docmind::ingest;
use docmind::models::ChatOutcome;

/// docmind — document ingestion and retrieval-augmented answering.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; built-in defaults apply when the file does not exist.
#[derive(Parser)]
#[command(
    name = "docmind",
    about = "Document ingestion and retrieval-augmented answering pipeline",
    version,
    long_about = "docmind parses documents (PDF or plain text) into overlapping chunks, \
    embeds them into a durable SQLite vector index, and answers natural-language questions \
    from the top-matching chunks plus prior conversation turns."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./docmind.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one or more documents into the index.
    ///
    /// Each file is parsed, chunked, embedded, and inserted under a source
    /// identifier derived from its basename. One result is emitted per
    /// path, in input order; a failing file never aborts the batch.
    Ingest {
        /// Files to ingest (.pdf, .txt, .md).
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Answer a question from the indexed documents.
    ///
    /// Retrieves the top-matching chunks (optionally restricted to a
    /// source filter), assembles a bounded prompt with the trailing
    /// conversation history, and invokes the generation backend.
    Chat {
        /// The question to answer.
        #[arg(long)]
        query: String,

        /// Restrict retrieval to these sources: a single source id or a
        /// JSON array of ids.
        #[arg(long)]
        filter: Option<String>,

        /// Prior turns as a JSON array of {"role","content"} objects,
        /// most recent last.
        #[arg(long)]
        history: Option<String>,
    },

    /// Remove a document and all of its index entries.
    Delete {
        /// Source identifier (file basename used at ingestion time).
        source: String,
    },

    /// Print index statistics.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Ingest { paths } => {
            let results = ingest::run_ingest(&config, &paths).await?;
            println!("{}", serde_json::to_string(&results)?);
        }
        Commands::Chat {
            query,
            filter,
            history,
        } => {
            let outcome = match answer::parse_history(history.as_deref()) {
                Ok(history) => {
                    let request = ChatRequest {
                        query,
                        filter: answer::parse_filter(filter.as_deref()),
                        history,
                    };
                    answer::run_chat(&config, &request).await?
                }
                Err(e) => ChatOutcome::Error {
                    message: e.to_string(),
                },
            };
            println!("{}", serde_json::to_string(&outcome)?);
        }
        Commands::Delete { source } => {
            let index = Index::open(&config).await?;
            let deleted = index.delete_source(&source).await?;
            index.close().await;
            println!(
                "{}",
                serde_json::json!({ "status": "success", "deletedChunks": deleted })
            );
        }
        Commands::Status => {
            let index = Index::open(&config).await?;
            let stats = index.stats().await?;
            index.close().await;
            println!(
                "{}",
                serde_json::json!({
                    "status": "success",
                    "documents": stats.documents,
                    "chunks": stats.chunks,
                    "vectors": stats.vectors,
                })
            );
        }
    }

    Ok(())
}
