//! Durable vector index over SQLite.
//!
//! Every pipeline invocation is a fresh process, so the index lives in a
//! file-backed SQLite database opened in WAL mode: readers never observe a
//! partially written entry, and concurrent writers from separate processes
//! serialize on the database lock. All writes happen inside transactions,
//! so a killed process leaves previously committed entries intact.
//!
//! Entries are `(chunk, embedding, source_id)` triples. Retrieval is
//! top-K cosine similarity, optionally restricted to a set of source
//! identifiers; ties are broken by insertion order (rowid).
//!
//! The embedding dimension is constant across the whole index: it is
//! recorded in `index_meta` on first insert and enforced afterwards.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

use crate::config::Config;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::PipelineError;
use crate::models::{Chunk, DocumentRecord, Retrieved};

/// Handle to the on-disk index.
pub struct Index {
    pool: SqlitePool,
}

/// Row counts for the `status` command.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexStats {
    pub documents: i64,
    pub chunks: i64,
    pub vectors: i64,
}

impl Index {
    /// Open (creating if missing) the index at the configured path and
    /// ensure the schema exists. Schema creation is idempotent.
    pub async fn open(config: &Config) -> Result<Self, PipelineError> {
        let db_path = &config.db.path;

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::IndexIo(e.to_string()))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(|e| PipelineError::IndexIo(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        ensure_schema(&pool).await?;

        Ok(Self { pool })
    }

    /// Insert a document with its chunks and embeddings, replacing any
    /// prior entry for the same source identifier, in one transaction.
    /// Re-ingesting a file therefore never leaves stale vectors behind.
    pub async fn replace_document(
        &self,
        doc: &DocumentRecord,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<(), PipelineError> {
        if chunks.len() != vectors.len() {
            return Err(PipelineError::IndexIo(format!(
                "chunk/vector count mismatch: {} vs {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let mut tx = self.pool.begin().await?;

        // Enforce the index-wide embedding dimension
        if let Some(vec) = vectors.first() {
            let dims = vec.len();
            if vectors.iter().any(|v| v.len() != dims) {
                return Err(PipelineError::IndexIo(
                    "inconsistent embedding dimensions within batch".to_string(),
                ));
            }

            let recorded: Option<String> =
                sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'dims'")
                    .fetch_optional(&mut *tx)
                    .await?;

            match recorded.and_then(|s| s.parse::<usize>().ok()) {
                Some(existing) if existing != dims => {
                    return Err(PipelineError::IndexIo(format!(
                        "embedding dimension mismatch: index has {}, got {}",
                        existing, dims
                    )));
                }
                Some(_) => {}
                None => {
                    sqlx::query("INSERT INTO index_meta (key, value) VALUES ('dims', ?)")
                        .bind(dims.to_string())
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        // Drop any prior entry for this source
        sqlx::query("DELETE FROM chunk_vectors WHERE source_id = ?")
            .bind(&doc.source_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE source_id = ?")
            .bind(&doc.source_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE source_id = ?")
            .bind(&doc.source_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO documents (source_id, title, byte_size, path, body, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.source_id)
        .bind(&doc.title)
        .bind(doc.byte_size)
        .bind(&doc.path)
        .bind(&doc.body)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&mut *tx)
        .await?;

        for (chunk, vec) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                "INSERT INTO chunks (id, source_id, chunk_index, text, page, hash) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.source_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(chunk.page)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO chunk_vectors (chunk_id, source_id, embedding) VALUES (?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.source_id)
            .bind(vec_to_blob(vec))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Return up to `k` entries ranked by descending cosine similarity to
    /// `query`. When `source_filter` is given, only entries whose source is
    /// in the set are eligible; a filter matching nothing yields an empty
    /// result, not an error. Ties preserve insertion order.
    pub async fn search(
        &self,
        query: &[f32],
        k: usize,
        source_filter: Option<&[String]>,
    ) -> Result<Vec<Retrieved>, PipelineError> {
        if let Some(filter) = source_filter {
            if filter.is_empty() {
                return Ok(Vec::new());
            }
        }

        let mut sql = String::from(
            "SELECT cv.chunk_id, cv.source_id, cv.embedding, c.text, c.page \
             FROM chunk_vectors cv JOIN chunks c ON c.id = cv.chunk_id",
        );
        if let Some(filter) = source_filter {
            let placeholders = vec!["?"; filter.len()].join(", ");
            sql.push_str(&format!(" WHERE cv.source_id IN ({})", placeholders));
        }
        sql.push_str(" ORDER BY cv.rowid");

        let mut q = sqlx::query(&sql);
        if let Some(filter) = source_filter {
            for source in filter {
                q = q.bind(source);
            }
        }

        let rows = q.fetch_all(&self.pool).await?;

        let mut candidates: Vec<Retrieved> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                Retrieved {
                    chunk_id: row.get("chunk_id"),
                    source_id: row.get("source_id"),
                    text: row.get("text"),
                    page: row.get("page"),
                    score: cosine_similarity(query, &vec) as f64,
                }
            })
            .collect();

        // Stable sort keeps rowid order for equal scores
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(k);

        Ok(candidates)
    }

    /// Remove a document and all of its chunks and vectors. Returns the
    /// number of chunks removed.
    pub async fn delete_source(&self, source_id: &str) -> Result<u64, PipelineError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors WHERE source_id = ?")
            .bind(source_id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM chunks WHERE source_id = ?")
            .bind(source_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM documents WHERE source_id = ?")
            .bind(source_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted)
    }

    pub async fn stats(&self) -> Result<IndexStats, PipelineError> {
        let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        let vectors: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
            .fetch_one(&self.pool)
            .await?;

        Ok(IndexStats {
            documents,
            chunks,
            vectors,
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            source_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            byte_size INTEGER NOT NULL,
            path TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            page INTEGER,
            hash TEXT NOT NULL,
            UNIQUE(source_id, chunk_index),
            FOREIGN KEY (source_id) REFERENCES documents(source_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL,
            embedding BLOB NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_source ON chunk_vectors(source_id)")
        .execute(pool)
        .await?;

    Ok(())
}
