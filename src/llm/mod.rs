//! Completion client abstraction
//!
//! One trait over the completion services the engine consumes: the synthesis
//! model and the feedback judge. Supports Ollama (local models) and OpenAI.
//! Every call is wrapped in a configured timeout; on expiry the call fails
//! instead of hanging. No retries here; retry policy belongs to the service,
//! not this engine.

use crate::config::{ModelConfig, ModelProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// Completion-service failures
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Completion timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Completion client trait
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a completion for a prompt
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create a completion client from configuration
pub fn create_client(config: &ModelConfig) -> Result<Box<dyn CompletionClient>, CompletionError> {
    match config.provider {
        ModelProvider::Ollama => Ok(Box::new(OllamaClient::new(config.clone()))),
        ModelProvider::OpenAI => Ok(Box::new(OpenAiClient::new(config.clone())?)),
    }
}

// ============================================================================
// Ollama
// ============================================================================

pub struct OllamaClient {
    config: ModelConfig,
    client: Client,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(config: ModelConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self { config, client }
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let url = format!("{}/api/generate", self.config.url);

        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let send = self.client.post(&url).json(&request).send();
        let response = timeout(Duration::from_secs(self.config.timeout_secs), send)
            .await
            .map_err(|_| CompletionError::Timeout(self.config.timeout_secs))?
            .map_err(|e| CompletionError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CompletionError::ModelError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        Ok(ollama_response.response)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// OpenAI
// ============================================================================

pub struct OpenAiClient {
    config: ModelConfig,
    client: Client,
    api_key: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}

impl OpenAiClient {
    pub fn new(config: ModelConfig) -> Result<Self, CompletionError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                CompletionError::AuthError(
                    "no API key in config and OPENAI_API_KEY is unset".to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Ok(Self {
            config,
            client,
            api_key,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.config.url);

        let mut body = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.config.temperature,
        });
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let send = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();
        let response = timeout(Duration::from_secs(self.config.timeout_secs), send)
            .await
            .map_err(|_| CompletionError::Timeout(self.config.timeout_secs))?
            .map_err(|e| CompletionError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CompletionError::AuthError("invalid API key".to_string()));
        }
        if !status.is_success() {
            return Err(CompletionError::ModelError(format!(
                "HTTP {}: {}",
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CompletionError::InvalidResponse("empty choices".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
