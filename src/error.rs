//! Pipeline error taxonomy.
//!
//! Per-file ingestion errors and per-query chat errors are captured into
//! structured result records and never abort the process; only
//! [`PipelineError::IndexIo`] may abort a whole invocation, since nothing
//! can proceed without the index.

/// Errors raised by the ingestion and answering pipelines.
#[derive(Debug)]
pub enum PipelineError {
    /// File extension is neither PDF nor a plain-text type.
    UnsupportedFormat(String),
    /// File is unreadable or corrupt (e.g. an encrypted or invalid PDF).
    Extraction(String),
    /// Embedding model/service could not be reached or rejected the request.
    EmbeddingBackend(String),
    /// Language-generation backend failed.
    GenerationBackend(String),
    /// Durable index storage is corrupt or unavailable.
    IndexIo(String),
    /// Command-line input could not be interpreted.
    MalformedArguments(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::UnsupportedFormat(ext) => {
                write!(f, "unsupported format: {}", ext)
            }
            PipelineError::Extraction(e) => write!(f, "extraction failed: {}", e),
            PipelineError::EmbeddingBackend(e) => {
                write!(f, "embedding backend unavailable: {}", e)
            }
            PipelineError::GenerationBackend(e) => {
                write!(f, "generation backend error: {}", e)
            }
            PipelineError::IndexIo(e) => write!(f, "index I/O error: {}", e),
            PipelineError::MalformedArguments(e) => {
                write!(f, "malformed arguments: {}", e)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        PipelineError::IndexIo(e.to_string())
    }
}
