//! Ollama chat client used by the LLM-backed collaborators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::{error::LLMError, Client};

/// Configuration for Ollama client
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama server URL (default: http://localhost:11434)
    pub host: String,
    /// Default model to use (default: phi4)
    pub default_model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            default_model: "phi4".to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Request structure for Ollama chat completions
#[derive(Debug, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
}

/// A message in Ollama's chat format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaMessage {
    pub role: String,
    pub content: String,
}

impl OllamaMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Options for Ollama generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

/// Response from Ollama's chat endpoint
#[derive(Debug, Deserialize)]
pub struct OllamaChatResponse {
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub message: OllamaMessage,
    pub done: bool,
    #[serde(default)]
    pub total_duration: u64,
    #[serde(default)]
    pub eval_count: u32,
}

/// Builder for one non-streaming chat completion
pub struct OllamaCompletionBuilder<'a> {
    pub(crate) client: &'a Client,
    pub(crate) model: Option<String>,
    pub(crate) messages: Vec<OllamaMessage>,
    pub(crate) temperature: Option<f32>,
    pub(crate) max_tokens: Option<u32>,
}

impl<'a> OllamaCompletionBuilder<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self {
            client,
            model: None,
            messages: Vec::new(),
            temperature: client.config.temperature,
            max_tokens: client.config.max_tokens,
        }
    }

    /// Set the model for this completion (overrides default)
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add a system message
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(OllamaMessage::system(content));
        self
    }

    /// Add a user message
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(OllamaMessage::user(content));
        self
    }

    /// Set the maximum number of tokens to generate
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub(crate) fn into_request(self) -> OllamaChatRequest {
        let options = if self.temperature.is_some() || self.max_tokens.is_some() {
            Some(OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            })
        } else {
            None
        };

        OllamaChatRequest {
            model: self
                .model
                .unwrap_or_else(|| self.client.config.default_model.clone()),
            messages: self.messages,
            stream: false,
            options,
        }
    }

    pub async fn execute(self) -> Result<String, LLMError> {
        let client = self.client;
        let request = self.into_request();
        let response = client.call_ollama_chat(&request).await?;
        if response.message.content.trim().is_empty() {
            return Err(LLMError::InvalidResponse(format!(
                "model '{}' returned an empty message",
                response.model
            )));
        }
        Ok(response.message.content)
    }
}

impl Client {
    pub async fn call_ollama_chat(
        &self,
        request: &OllamaChatRequest,
    ) -> Result<OllamaChatResponse, LLMError> {
        let response = self
            .http
            .post(format!("{}/api/chat", self.config.host))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::OllamaError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let chat_response: OllamaChatResponse = response.json().await?;
        log::debug!(
            "Ollama '{}' answered with {} tokens in {} ns",
            chat_response.model,
            chat_response.eval_count,
            chat_response.total_duration
        );
        Ok(chat_response)
    }

    pub fn complete(&self) -> OllamaCompletionBuilder<'_> {
        OllamaCompletionBuilder::new(self)
    }
}
