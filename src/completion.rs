//! Chat-completion provider abstraction and the relay that wraps it.
//!
//! - **[`CompletionProvider`]** — one request/response call to a model.
//! - **[`OpenAiProvider`]** — `POST {base_url}/chat/completions` on an
//!   OpenAI-compatible API.
//! - **[`CompletionRelay`]** — builds the system + user exchange, calls the
//!   provider once, and turns any failure into the configured fallback reply.
//!
//! # Failure handling
//!
//! Network errors, timeouts, authentication and quota errors, and malformed
//! responses are all handled the same way: the relay logs the error and the
//! user gets the fallback text. There are no retries.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CompletionConfig;
use crate::models::ChatMessage;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    #[error("request to completion API failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion API error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid completion response: {0}")]
    Malformed(String),
}

/// A backend that turns a message list into the assistant's reply text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}

/// Calls an OpenAI-compatible chat completions endpoint.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiProvider {
    /// Creates a provider. A missing API key is not an error here; every
    /// call fails with [`CompletionError::MissingApiKey`] instead.
    pub fn new(config: &CompletionConfig, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingApiKey)?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api { status, body });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;
        parse_completion_response(&json)
    }
}

/// Extracts `choices[0].message.content`, unmodified.
fn parse_completion_response(json: &serde_json::Value) -> Result<String, CompletionError> {
    let choice = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| CompletionError::Malformed("missing choices".to_string()))?;

    choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| CompletionError::Malformed("missing message content".to_string()))
}

/// Turns one user message into one reply, never failing.
pub struct CompletionRelay {
    provider: Arc<dyn CompletionProvider>,
    fallback_reply: String,
}

impl CompletionRelay {
    pub fn new(provider: Arc<dyn CompletionProvider>, fallback_reply: impl Into<String>) -> Self {
        Self {
            provider,
            fallback_reply: fallback_reply.into(),
        }
    }

    pub fn fallback_reply(&self) -> &str {
        &self.fallback_reply
    }

    /// Asks the model to answer `user_message` under `system_context`.
    /// Returns the model's text on success and the fallback reply otherwise.
    pub async fn respond(&self, system_context: &str, user_message: &str) -> String {
        let messages = [
            ChatMessage::system(system_context),
            ChatMessage::user(user_message),
        ];

        match self.provider.complete(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(
                    model = self.provider.model_name(),
                    error = %e,
                    "completion request failed; sending fallback reply"
                );
                self.fallback_reply.clone()
            }
        }
    }
}
