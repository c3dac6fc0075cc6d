//! LLM-backed collaborators.
//!
//! An Ollama chat client plus [`LlmCollaborators`], which plays the four
//! analyst roles (metadata analyst, technical analyst, summarizer, Python
//! engineer) and the intent classifier.

pub mod collaborators;
pub mod error;
pub mod ollama;

pub use collaborators::{extract_python_code, LlmCollaborators};
pub use error::LLMError;
pub use ollama::{OllamaCompletionBuilder, OllamaConfig, OllamaMessage};

use crate::config::LlmSection;

/// LLM client wrapper around reqwest::Client
#[derive(Clone)]
pub struct Client {
    /// The underlying HTTP client
    pub(crate) http: reqwest::Client,
    pub(crate) config: OllamaConfig,
}

impl Client {
    pub fn new(config: OllamaConfig) -> Self {
        Client {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_config(section: &LlmSection) -> Self {
        Self::new(OllamaConfig {
            host: section.host.clone(),
            default_model: section.model.clone(),
            temperature: section.temperature,
            max_tokens: section.max_tokens,
        })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(OllamaConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Client::default();
        assert_eq!(client.config().host, "http://localhost:11434");
        assert_eq!(client.config().default_model, "phi4");
    }

    #[test]
    fn test_client_from_config_section() {
        let section = LlmSection {
            host: "http://192.168.1.10:11434".to_string(),
            model: "llama3".to_string(),
            temperature: Some(0.1),
            max_tokens: None,
        };
        let client = Client::from_config(&section);
        assert_eq!(client.config().host, "http://192.168.1.10:11434");
        assert_eq!(client.config().default_model, "llama3");
        assert_eq!(client.config().temperature, Some(0.1));
    }
}
