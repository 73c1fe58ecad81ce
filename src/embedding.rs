//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`HashProvider`]** — deterministic local embeddings derived from
//!   token hashes; no network, suitable for tests and offline runs.
//! - **[`HuggingFaceProvider`]** — calls the Hugging Face Inference API
//!   feature-extraction endpoint with batching, retry, and backoff.
//!
//! The same provider configuration must be used at ingestion and query
//! time; distances are only meaningful within one embedding space.
//!
//! Also provides vector utilities for the index:
//! - [`cosine_similarity`] — similarity between two embedding vectors
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes
//! - [`blob_to_vec`] — decode a BLOB back into a `Vec<f32>`
//!
//! # Retry Strategy
//!
//! The Hugging Face provider retries transient failures with exponential
//! backoff (1s, 2s, 4s, ... capped at 32s): HTTP 429/5xx and network
//! errors retry; other 4xx fail immediately.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::PipelineError;

/// Trait for embedding backends. Implementations must be pure: the same
/// input text always yields the same vector under one configuration.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"sentence-transformers/all-MiniLM-L6-v2"`).
    fn model_name(&self) -> &str;
    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed a batch of texts, returning one vector per input, in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;
}

/// Embed a single query text.
pub async fn embed_query(
    provider: &dyn EmbeddingProvider,
    text: &str,
) -> Result<Vec<f32>, PipelineError> {
    let results = provider.embed_batch(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::EmbeddingBackend("empty embedding response".to_string()))
}

/// Create the appropriate [`EmbeddingProvider`] from configuration.
pub fn create_provider(
    config: &EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>, PipelineError> {
    match config.provider.as_str() {
        "hash" => Ok(Box::new(HashProvider::new(config.dims))),
        "huggingface" => Ok(Box::new(HuggingFaceProvider::new(config)?)),
        other => Err(PipelineError::EmbeddingBackend(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

// ============ Hash Provider ============

/// Deterministic local embedding provider.
///
/// Each lowercase alphanumeric token is hashed into a bucket of the output
/// vector, and the result is L2-normalised so cosine similarity reduces to
/// a dot product. Texts sharing tokens land near each other, which is
/// enough signal for retrieval tests without any model backend.
pub struct HashProvider {
    dims: usize,
}

impl HashProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims];

        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes(digest[..8].try_into().unwrap()) as usize % self.dims;
            let sign_byte = digest[8];
            vec[bucket] += if sign_byte & 1 == 0 { 1.0 } else { -1.0 };
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vec.iter_mut() {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

// ============ Hugging Face Provider ============

/// Embedding provider using the Hugging Face Inference API.
///
/// Calls the feature-extraction pipeline for the configured
/// sentence-transformers model. Requires the `HUGGINGFACEHUB_API_TOKEN`
/// environment variable.
pub struct HuggingFaceProvider {
    model: String,
    dims: usize,
    token: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl HuggingFaceProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, PipelineError> {
        let token = std::env::var("HUGGINGFACEHUB_API_TOKEN").map_err(|_| {
            PipelineError::EmbeddingBackend(
                "HUGGINGFACEHUB_API_TOKEN is not set in the environment".to_string(),
            )
        })?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            token,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| PipelineError::EmbeddingBackend(e.to_string()))?;

        let url = format!(
            "https://api-inference.huggingface.co/pipeline/feature-extraction/{}",
            self.model
        );
        let body = serde_json::json!({
            "inputs": texts,
            "options": { "wait_for_model": true },
        });

        let mut last_err: Option<PipelineError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.token))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let vectors: Vec<Vec<f32>> = response.json().await.map_err(|e| {
                            PipelineError::EmbeddingBackend(format!(
                                "invalid feature-extraction response: {}",
                                e
                            ))
                        })?;
                        if vectors.len() != texts.len() {
                            return Err(PipelineError::EmbeddingBackend(format!(
                                "expected {} vectors, got {}",
                                texts.len(),
                                vectors.len()
                            )));
                        }
                        return Ok(vectors);
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(PipelineError::EmbeddingBackend(format!(
                            "HF API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    // Other client errors: fail immediately
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(PipelineError::EmbeddingBackend(format!(
                        "HF API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(PipelineError::EmbeddingBackend(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            PipelineError::EmbeddingBackend("embedding failed after retries".to_string())
        }))
    }
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`. Returns `0.0` for empty vectors or
/// vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
