//! Core data models used throughout docmind.
//!
//! These types represent the documents, chunks, retrieval hits, and
//! command results that flow through the ingestion and answering pipeline.

use serde::{Deserialize, Serialize};

/// Normalized document stored in the index.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    /// Stable source identifier (file basename); unique per index.
    pub source_id: String,
    pub title: String,
    pub byte_size: i64,
    pub path: String,
    /// Full extracted text.
    pub body: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A chunk of a document's extracted text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub source_id: String,
    pub chunk_index: i64,
    pub text: String,
    /// Originating page number (1-based) when the source format has pages.
    pub page: Option<i64>,
    pub hash: String,
}

/// A chunk returned from a vector search, ranked by similarity.
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub chunk_id: String,
    pub source_id: String,
    pub text: String,
    pub page: Option<i64>,
    pub score: f64,
}

/// One conversation turn, most recent last in a history list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

/// Per-file ingestion result. One of these is emitted per input path,
/// in input order, regardless of individual failures.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IngestOutcome {
    Success {
        #[serde(rename = "chunkCount")]
        chunk_count: usize,
        file: String,
    },
    Error {
        message: String,
    },
}

/// Chat result. Always emitted as a well-formed JSON object, even when
/// the underlying backends fail.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChatOutcome {
    Success { answer: String },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_outcome_serializes_to_contract_shape() {
        let ok = IngestOutcome::Success {
            chunk_count: 3,
            file: "notes.txt".to_string(),
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["chunkCount"], 3);

        let err = IngestOutcome::Error {
            message: "extraction failed: bad pdf".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json["message"].as_str().unwrap().contains("bad pdf"));
    }

    #[test]
    fn chat_outcome_serializes_to_contract_shape() {
        let ok = ChatOutcome::Success {
            answer: "Paris".to_string(),
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["answer"], "Paris");
    }

    #[test]
    fn turn_roundtrips_role_and_content() {
        let parsed: Vec<Turn> =
            serde_json::from_str(r#"[{"role":"user","content":"hi"}]"#).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].role, "user");
        assert_eq!(parsed[0].content, "hi");
    }
}
