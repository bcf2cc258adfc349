//! Model collaborator client.
//!
//! The pipeline talks to a hosted text-completion service through the
//! [`CompletionClient`] trait so tests can substitute a canned double. The
//! production implementation targets any OpenAI-compatible chat completions
//! endpoint (Groq by default).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::{AppError, AppResult};

/// A text-completion collaborator invoked with a prompt and bounded output.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send one completion request and return the raw response text.
    ///
    /// Responses are untrusted; callers must parse defensively.
    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> AppResult<String>;
}

/// Groq chat completions client (OpenAI-compatible wire format).
pub struct GroqClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GroqClient {
    /// Build a client from model configuration.
    ///
    /// Fails when no API key is configured; development setups without a key
    /// should expect every model call to be contained by the pipeline's
    /// per-chunk and fallback policies instead.
    pub fn new(config: &ModelConfig) -> AppResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::ModelCall("GROQ_API_KEY is not set".to_string()))?;

        Ok(GroqClient {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl CompletionClient for GroqClient {
    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> AppResult<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::ModelCall(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ModelCall(format!(
                "Completion API returned {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::ModelOutput(format!("Invalid response body: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AppError::ModelOutput("No choices in response".to_string()))
    }
}

/// Stand-in client for development runs without an API key.
///
/// Every call fails with a model-call error, which the pipeline contains:
/// jobs still complete with statistics and the templated fallback brief.
pub struct OfflineClient;

#[async_trait]
impl CompletionClient for OfflineClient {
    async fn complete(
        &self,
        _system: &str,
        _prompt: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> AppResult<String> {
        Err(AppError::ModelCall("No model API key configured".to_string()))
    }
}
