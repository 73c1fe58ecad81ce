//! Retrieval-augmented answering pipeline.
//!
//! Embeds the query under the same provider configuration used at
//! ingestion time, retrieves the top-K chunks (optionally restricted to a
//! source filter), assembles a bounded prompt, and invokes the generation
//! backend. Backend failures are captured into a structured error result;
//! the command contract always returns a well-formed JSON object.

use crate::config::{Config, RetrievalConfig};
use crate::embedding;
use crate::error::PipelineError;
use crate::generation::{self, Prompt};
use crate::index::Index;
use crate::models::{ChatOutcome, Retrieved, Turn};

/// Context sentinel used when retrieval returns nothing. An empty result
/// set is not an error; generation still runs against this.
pub const EMPTY_CONTEXT: &str = "No relevant context found.";

/// A parsed chat invocation.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub query: String,
    /// Source identifiers retrieval is restricted to; `None` searches the
    /// whole index.
    pub filter: Option<Vec<String>>,
    /// Prior turns, most recent last.
    pub history: Vec<Turn>,
}

/// Interpret a `--filter` argument: a JSON array of source ids, a JSON
/// string, or a bare source id. Never an error; the bare form is part of
/// the contract.
pub fn parse_filter(arg: Option<&str>) -> Option<Vec<String>> {
    let arg = arg?;
    match serde_json::from_str::<serde_json::Value>(arg) {
        Ok(serde_json::Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        Ok(serde_json::Value::String(s)) => Some(vec![s]),
        _ => Some(vec![arg.to_string()]),
    }
}

/// Interpret a `--history` argument as a JSON array of `{role, content}`
/// objects.
pub fn parse_history(arg: Option<&str>) -> Result<Vec<Turn>, PipelineError> {
    match arg {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str::<Vec<Turn>>(raw).map_err(|e| {
            PipelineError::MalformedArguments(format!(
                "--history must be a JSON array of {{role, content}} objects: {}",
                e
            ))
        }),
    }
}

/// Answer a query against the index. Only an unusable index propagates as
/// an error; everything else is folded into the returned outcome.
pub async fn run_chat(config: &Config, request: &ChatRequest) -> Result<ChatOutcome, PipelineError> {
    let index = Index::open(config).await?;
    let outcome = chat_inner(config, &index, request).await;
    index.close().await;

    Ok(match outcome {
        Ok(answer) => ChatOutcome::Success { answer },
        Err(e) => ChatOutcome::Error {
            message: e.to_string(),
        },
    })
}

async fn chat_inner(
    config: &Config,
    index: &Index,
    request: &ChatRequest,
) -> Result<String, PipelineError> {
    let embedder = embedding::create_provider(&config.embedding)?;
    let generator = generation::create_provider(&config.generation)?;

    let query_vec = embedding::embed_query(embedder.as_ref(), &request.query).await?;
    let hits = index
        .search(&query_vec, config.retrieval.top_k, request.filter.as_deref())
        .await?;

    match &request.filter {
        Some(f) => eprintln!("retrieved {} chunk(s) across {} source(s)", hits.len(), f.len()),
        None => eprintln!("retrieved {} chunk(s), unfiltered", hits.len()),
    }

    let prompt = assemble_prompt(&request.query, &hits, &request.history, &config.retrieval);
    generator.generate(&prompt).await
}

/// Assemble the bounded prompt: ranked chunks with source attribution,
/// the trailing history window, and the query. When the assembled content
/// exceeds the budget, older history is dropped first, then lower-ranked
/// chunks; recency and relevance win over completeness.
pub fn assemble_prompt(
    query: &str,
    hits: &[Retrieved],
    history: &[Turn],
    retrieval: &RetrievalConfig,
) -> Prompt {
    let start = history.len().saturating_sub(retrieval.history_window);
    let mut window: Vec<Turn> = history[start..].to_vec();
    let mut kept: Vec<Retrieved> = hits.to_vec();

    let budget = retrieval.context_budget_chars;

    while assembled_size(query, &kept, &window) > budget && !window.is_empty() {
        window.remove(0);
    }
    while assembled_size(query, &kept, &window) > budget && kept.len() > 1 {
        kept.pop();
    }

    Prompt {
        context: format_context(&kept),
        history: window,
        question: query.to_string(),
    }
}

fn assembled_size(query: &str, kept: &[Retrieved], window: &[Turn]) -> usize {
    query.len()
        + window.iter().map(|t| t.content.len()).sum::<usize>()
        + format_context(kept).len()
}

/// Render retrieved chunks for the prompt, each attributed to its source
/// document (and page, when known).
pub fn format_context(hits: &[Retrieved]) -> String {
    if hits.is_empty() {
        return EMPTY_CONTEXT.to_string();
    }

    hits.iter()
        .map(|h| {
            let mut header = format!("[source: {}", h.source_id);
            if let Some(page) = h.page {
                header.push_str(&format!(", page {}", page));
            }
            header.push(']');
            format!("{}\n{}", header, h.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
