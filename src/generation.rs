//! Language-generation provider abstraction and implementations.
//!
//! Defines the [`GenerationProvider`] trait and concrete implementations:
//! - **[`EchoProvider`]** — returns the assembled context block verbatim;
//!   deterministic, no network, suitable for tests and offline runs.
//! - **[`HuggingFaceProvider`]** — calls the Hugging Face router
//!   chat-completions endpoint with the configured instruct model.
//!
//! Generation failures are not retried here: the caller decides whether to
//! retry a whole chat invocation.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::PipelineError;
use crate::models::Turn;

/// System instruction sent ahead of every chat completion.
pub const SYSTEM_PROMPT: &str = "You are DocMind, an intelligent document analysis assistant. \
Answer the question based strictly on the provided Context. If the information is not in the \
context, say: \"I'm sorry, I don't see that information in the uploaded documents.\" \
Keep your answers professional and concise.";

/// Fully assembled prompt handed to a generation backend.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Retrieved chunk texts with source attribution, or a sentinel when
    /// retrieval found nothing.
    pub context: String,
    /// Trailing conversation window, most recent last.
    pub history: Vec<Turn>,
    pub question: String,
}

impl Prompt {
    /// Flatten into chat-completion messages: system, history, then the
    /// context-bearing user turn.
    pub fn to_messages(&self) -> Vec<serde_json::Value> {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": SYSTEM_PROMPT,
        })];

        for turn in &self.history {
            let role = if turn.role == "assistant" {
                "assistant"
            } else {
                "user"
            };
            messages.push(serde_json::json!({
                "role": role,
                "content": turn.content,
            }));
        }

        messages.push(serde_json::json!({
            "role": "user",
            "content": format!("Context:\n{}\n\nQuestion:\n{}", self.context, self.question),
        }));

        messages
    }
}

/// Trait for generation backends.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Model identifier (e.g. `"mistralai/Mistral-7B-Instruct-v0.2"`).
    fn model_name(&self) -> &str;
    /// Produce an answer for the assembled prompt.
    async fn generate(&self, prompt: &Prompt) -> Result<String, PipelineError>;
}

/// Create the appropriate [`GenerationProvider`] from configuration.
pub fn create_provider(
    config: &GenerationConfig,
) -> Result<Box<dyn GenerationProvider>, PipelineError> {
    match config.provider.as_str() {
        "echo" => Ok(Box::new(EchoProvider)),
        "huggingface" => Ok(Box::new(HuggingFaceProvider::new(config)?)),
        other => Err(PipelineError::GenerationBackend(format!(
            "unknown generation provider: {}",
            other
        ))),
    }
}

// ============ Echo Provider ============

/// A deterministic backend that answers with the prompt's context block.
///
/// Lets the whole pipeline run end-to-end without a model: whatever was
/// retrieved (or the empty-retrieval sentinel) becomes the answer.
pub struct EchoProvider;

#[async_trait]
impl GenerationProvider for EchoProvider {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, PipelineError> {
        Ok(prompt.context.trim().to_string())
    }
}

// ============ Hugging Face Provider ============

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

/// Generation provider using the Hugging Face router's OpenAI-compatible
/// chat-completions endpoint. Requires `HUGGINGFACEHUB_API_TOKEN`.
pub struct HuggingFaceProvider {
    model: String,
    token: String,
    max_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
}

impl HuggingFaceProvider {
    pub fn new(config: &GenerationConfig) -> Result<Self, PipelineError> {
        let token = std::env::var("HUGGINGFACEHUB_API_TOKEN").map_err(|_| {
            PipelineError::GenerationBackend(
                "HUGGINGFACEHUB_API_TOKEN is not set in the environment".to_string(),
            )
        })?;

        Ok(Self {
            model: config.model.clone(),
            token,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl GenerationProvider for HuggingFaceProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| PipelineError::GenerationBackend(e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": prompt.to_messages(),
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let response = client
            .post("https://router.huggingface.co/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::GenerationBackend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(PipelineError::GenerationBackend(format!(
                "HF API error {}: {}",
                status, body_text
            )));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            PipelineError::GenerationBackend(format!("invalid chat-completion response: {}", e))
        })?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                PipelineError::GenerationBackend("chat-completion response had no choices".into())
            })?;

        Ok(answer.trim().to_string())
    }
}
