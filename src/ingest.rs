//! Ingestion pipeline orchestration.
//!
//! For each input file: parse → chunk → embed → single-transaction index
//! insert. Produces one result per file, in input order. A failure on one
//! file is captured into its result and never aborts the rest of the
//! batch; only an unusable index aborts the whole invocation.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::chunk::chunk_document;
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::PipelineError;
use crate::index::Index;
use crate::models::{DocumentRecord, IngestOutcome};
use crate::parse;

/// Source identifier for a file: its basename, matching how the caller
/// later references the document in chat filters.
pub fn source_id_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Ingest each path, returning one outcome per path in input order.
pub async fn run_ingest(
    config: &Config,
    paths: &[PathBuf],
) -> Result<Vec<IngestOutcome>, PipelineError> {
    let index = Index::open(config).await?;

    let provider = match embedding::create_provider(&config.embedding) {
        Ok(p) => p,
        Err(e) => {
            // Misconfigured backend fails every file identically
            let message = e.to_string();
            return Ok(paths
                .iter()
                .map(|_| IngestOutcome::Error {
                    message: message.clone(),
                })
                .collect());
        }
    };

    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        match ingest_file(&index, provider.as_ref(), config, path).await {
            Ok(chunk_count) => {
                eprintln!("ingested {} ({} chunks)", path.display(), chunk_count);
                results.push(IngestOutcome::Success {
                    chunk_count,
                    file: source_id_for(path),
                });
            }
            Err(e) => {
                eprintln!("warning: failed to ingest {}: {}", path.display(), e);
                results.push(IngestOutcome::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    index.close().await;
    Ok(results)
}

async fn ingest_file(
    index: &Index,
    provider: &dyn EmbeddingProvider,
    config: &Config,
    path: &Path,
) -> Result<usize, PipelineError> {
    let pages = parse::extract_file(path)?;
    let source_id = source_id_for(path);

    let chunks = chunk_document(
        &source_id,
        &pages,
        config.chunking.max_chars,
        config.chunking.overlap_chars,
    );

    let mut vectors = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        vectors.extend(provider.embed_batch(&texts).await?);
    }

    let byte_size = std::fs::metadata(path).map(|m| m.len() as i64).unwrap_or(0);
    let body = pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let now = Utc::now().timestamp();

    let doc = DocumentRecord {
        source_id: source_id.clone(),
        title: source_id,
        byte_size,
        path: path.display().to_string(),
        body,
        created_at: now,
        updated_at: now,
    };

    index.replace_document(&doc, &chunks, &vectors).await?;
    Ok(chunks.len())
}
