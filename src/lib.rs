//! # docmind
//!
//! A document ingestion and retrieval-augmented answering pipeline
//! ("chat with your documents").
//!
//! docmind parses uploaded documents (PDF or plain text) into text, splits
//! the text into overlapping chunks, embeds each chunk, and persists the
//! vectors in a durable per-install SQLite index. Questions are answered
//! by retrieving the top-matching chunks — optionally restricted to a set
//! of source documents — assembling a bounded prompt with prior
//! conversation turns, and invoking a language-generation backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌─────────┐   ┌──────────┐   ┌──────────┐
//! │ Parser │──▶│ Chunker │──▶│ Embedder │──▶│  SQLite  │
//! │ PDF/txt│   │ overlap │   │ HF/hash  │   │  vectors │
//! └────────┘   └─────────┘   └──────────┘   └────┬─────┘
//!                                                │
//!                       query ──▶ embed ──▶ top-K search
//!                                                │
//!                              prompt assembly ──▶ generation
//! ```
//!
//! ## Invocation
//!
//! Each command runs as an isolated batch process and writes exactly one
//! JSON value as the final line of standard output:
//!
//! ```bash
//! docmind ingest report.pdf notes.txt
//! docmind chat --query "What is the capital of France?" --filter report.pdf
//! docmind delete report.pdf
//! docmind status
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and result records |
//! | [`error`] | Pipeline error taxonomy |
//! | [`parse`] | Document text extraction |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generation`] | Language-generation provider abstraction |
//! | [`index`] | Durable SQLite vector index |
//! | [`ingest`] | Per-file ingestion pipeline |
//! | [`answer`] | Retrieval-augmented answering pipeline |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod models;
pub mod parse;
