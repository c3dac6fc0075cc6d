//! The standard capabilities and the collaborator contract behind them.
//!
//! Each capability is a thin adapter: it decodes its typed inputs, calls the
//! matching [`Collaborators`] method and encodes the typed result back into
//! a [`Payload`]. The collaborators themselves (LLM calls, spreadsheet
//! analysis, storage) live outside the orchestration core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::core::capability::{names, slots, Capability, CapabilityInput};
use crate::core::error::CapabilityError;
use crate::core::registry::CapabilityRegistry;
use crate::core::signature::Signature;
use crate::core::Payload;

/// Descriptive facts about a EUDA: owner, purpose, sheets, complexity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataPayload {
    pub content: String,
}

/// Formulas, VBA modules and data connections of a EUDA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicalPayload {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryPayload {
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodePayload {
    pub language: String,
    pub code: String,
}

/// Error reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        CollaboratorError(message.into())
    }
}

impl From<CollaboratorError> for CapabilityError {
    fn from(e: CollaboratorError) -> Self {
        CapabilityError::Collaborator(e.0)
    }
}

/// The external services the standard capabilities delegate to.
#[async_trait]
pub trait Collaborators: Send + Sync + 'static {
    async fn fetch_metadata(&self, query: &str) -> Result<MetadataPayload, CollaboratorError>;

    async fn fetch_technical(&self, query: &str) -> Result<TechnicalPayload, CollaboratorError>;

    async fn summarize(
        &self,
        metadata: &MetadataPayload,
        technical: &TechnicalPayload,
    ) -> Result<SummaryPayload, CollaboratorError>;

    async fn generate_code(
        &self,
        technical: &TechnicalPayload,
        query: &str,
    ) -> Result<CodePayload, CollaboratorError>;

    /// Free-text category label, validated by the intent classifier.
    async fn classify_intent(&self, query: &str) -> Result<String, CollaboratorError>;
}

fn encode<T: Serialize>(value: &T) -> Result<Payload, CapabilityError> {
    serde_json::to_value(value)
        .map_err(|e| CapabilityError::Collaborator(format!("unserializable result: {}", e)))
}

pub struct FetchMetadata(Arc<dyn Collaborators>);

#[async_trait]
impl Capability for FetchMetadata {
    fn name(&self) -> &str {
        names::FETCH_METADATA
    }

    fn signature(&self) -> Signature {
        Signature::new()
            .input(slots::QUERY, "the user's question")
            .output(slots::METADATA, "descriptive facts about the EUDA")
    }

    async fn execute(&self, input: &CapabilityInput) -> Result<Payload, CapabilityError> {
        let metadata = self.0.fetch_metadata(input.str(slots::QUERY)?).await?;
        encode(&metadata)
    }
}

pub struct FetchTechnical(Arc<dyn Collaborators>);

#[async_trait]
impl Capability for FetchTechnical {
    fn name(&self) -> &str {
        names::FETCH_TECHNICAL
    }

    fn signature(&self) -> Signature {
        Signature::new()
            .input(slots::QUERY, "the user's question")
            .output(slots::TECHNICAL, "formulas, macros and data connections")
    }

    async fn execute(&self, input: &CapabilityInput) -> Result<Payload, CapabilityError> {
        let technical = self.0.fetch_technical(input.str(slots::QUERY)?).await?;
        encode(&technical)
    }
}

pub struct Summarize(Arc<dyn Collaborators>);

#[async_trait]
impl Capability for Summarize {
    fn name(&self) -> &str {
        names::SUMMARIZE
    }

    fn signature(&self) -> Signature {
        Signature::new()
            .input(slots::METADATA, "output of fetch_metadata")
            .input(slots::TECHNICAL, "output of fetch_technical")
            .output("summary", "combined analysis")
    }

    async fn execute(&self, input: &CapabilityInput) -> Result<Payload, CapabilityError> {
        let metadata: MetadataPayload = input.decode(slots::METADATA)?;
        let technical: TechnicalPayload = input.decode(slots::TECHNICAL)?;
        let summary = self.0.summarize(&metadata, &technical).await?;
        encode(&summary)
    }
}

pub struct GenerateCode(Arc<dyn Collaborators>);

#[async_trait]
impl Capability for GenerateCode {
    fn name(&self) -> &str {
        names::GENERATE_CODE
    }

    fn signature(&self) -> Signature {
        Signature::new()
            .input(slots::TECHNICAL, "output of fetch_technical")
            .input(slots::QUERY, "the user's question")
            .output("code", "replacement program")
    }

    async fn execute(&self, input: &CapabilityInput) -> Result<Payload, CapabilityError> {
        let technical: TechnicalPayload = input.decode(slots::TECHNICAL)?;
        let code = self
            .0
            .generate_code(&technical, input.str(slots::QUERY)?)
            .await?;
        encode(&code)
    }
}

pub struct ClassifyIntent(Arc<dyn Collaborators>);

#[async_trait]
impl Capability for ClassifyIntent {
    fn name(&self) -> &str {
        names::CLASSIFY_INTENT
    }

    fn signature(&self) -> Signature {
        Signature::new()
            .input(slots::QUERY, "the user's question")
            .output("category", "raw category label")
    }

    async fn execute(&self, input: &CapabilityInput) -> Result<Payload, CapabilityError> {
        let raw = self.0.classify_intent(input.str(slots::QUERY)?).await?;
        Ok(Payload::String(raw))
    }
}

/// Registers the five standard capabilities against one set of collaborators.
pub fn standard_registry(collaborators: Arc<dyn Collaborators>) -> CapabilityRegistry {
    CapabilityRegistry::builder()
        .register(ClassifyIntent(collaborators.clone()))
        .register(FetchMetadata(collaborators.clone()))
        .register(FetchTechnical(collaborators.clone()))
        .register(Summarize(collaborators.clone()))
        .register(GenerateCode(collaborators))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Canned;

    #[async_trait]
    impl Collaborators for Canned {
        async fn fetch_metadata(&self, query: &str) -> Result<MetadataPayload, CollaboratorError> {
            Ok(MetadataPayload {
                content: format!("meta:{}", query),
            })
        }

        async fn fetch_technical(&self, query: &str) -> Result<TechnicalPayload, CollaboratorError> {
            Ok(TechnicalPayload {
                content: format!("tech:{}", query),
            })
        }

        async fn summarize(
            &self,
            metadata: &MetadataPayload,
            technical: &TechnicalPayload,
        ) -> Result<SummaryPayload, CollaboratorError> {
            Ok(SummaryPayload {
                summary: format!("{} + {}", metadata.content, technical.content),
            })
        }

        async fn generate_code(
            &self,
            _technical: &TechnicalPayload,
            _query: &str,
        ) -> Result<CodePayload, CollaboratorError> {
            Err(CollaboratorError::new("engineer unavailable"))
        }

        async fn classify_intent(&self, _query: &str) -> Result<String, CollaboratorError> {
            Ok("Both".to_string())
        }
    }

    #[test]
    fn test_standard_registry_contents() {
        let registry = standard_registry(Arc::new(Canned));
        assert_eq!(
            registry.names(),
            vec![
                "classify_intent",
                "fetch_metadata",
                "fetch_technical",
                "generate_code",
                "summarize"
            ]
        );
    }

    #[tokio::test]
    async fn test_summarize_decodes_upstream_payloads() {
        let registry = standard_registry(Arc::new(Canned));
        let input = CapabilityInput::new()
            .with(slots::METADATA, json!({"content": "owner: finance"}))
            .with(slots::TECHNICAL, json!({"content": "3 VBA modules"}));

        let out = registry.get("summarize").unwrap().execute(&input).await.unwrap();
        assert_eq!(out, json!({"summary": "owner: finance + 3 VBA modules"}));
    }

    #[tokio::test]
    async fn test_malformed_upstream_payload_is_invalid_input() {
        let registry = standard_registry(Arc::new(Canned));
        let input = CapabilityInput::new()
            .with(slots::METADATA, json!("not an object"))
            .with(slots::TECHNICAL, json!({"content": "x"}));

        let err = registry.get("summarize").unwrap().execute(&input).await.unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidInput { ref slot, .. } if slot == "metadata"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_collaborator_errors_become_retryable_capability_errors() {
        let registry = standard_registry(Arc::new(Canned));
        let input = CapabilityInput::new()
            .with(slots::TECHNICAL, json!({"content": "x"}))
            .with(slots::QUERY, "script please");

        let err = registry
            .get("generate_code")
            .unwrap()
            .execute(&input)
            .await
            .unwrap_err();
        assert_eq!(err, CapabilityError::Collaborator("engineer unavailable".into()));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_classify_intent_passes_raw_text_through() {
        let registry = standard_registry(Arc::new(Canned));
        let out = registry
            .get("classify_intent")
            .unwrap()
            .execute(&CapabilityInput::new().with(slots::QUERY, "q"))
            .await
            .unwrap();
        assert_eq!(out, json!("Both"));
    }
}
