use thiserror::Error;

use crate::capabilities::CollaboratorError;

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Ollama error: {0}")]
    OllamaError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<LLMError> for CollaboratorError {
    fn from(e: LLMError) -> Self {
        CollaboratorError::new(e.to_string())
    }
}
