use std::time::Duration;

use crate::core::capability::{names, slots, CapabilityInput};
use crate::core::category::Category;
use crate::core::error::{ItemFailure, OrchestratorError};
use crate::core::registry::CapabilityRegistry;
use crate::core::retry::{invoke_with_retry, RetryPolicy};

/// Maps a raw query to exactly one [`Category`] through the registered
/// `classify_intent` capability.
///
/// Unavailability is retried under the configured policy; a reply that does
/// not normalize to a known category is fatal immediately.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    registry: CapabilityRegistry,
    retry: RetryPolicy,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(registry: CapabilityRegistry, retry: RetryPolicy, timeout: Duration) -> Self {
        IntentClassifier {
            registry,
            retry,
            timeout,
        }
    }

    pub async fn classify(&self, query: &str) -> Result<Category, OrchestratorError> {
        if query.trim().is_empty() {
            return Err(OrchestratorError::EmptyQuery);
        }

        let capability = self.registry.get(names::CLASSIFY_INTENT).ok_or_else(|| {
            OrchestratorError::ClassificationUnavailable {
                attempts: 0,
                message: format!("capability '{}' is not registered", names::CLASSIFY_INTENT),
            }
        })?;

        let input = CapabilityInput::new().with(slots::QUERY, query);
        let (reply, attempts) =
            invoke_with_retry(capability.as_ref(), &input, &self.retry, self.timeout)
                .await
                .map_err(|exhausted| {
                    let failure = ItemFailure::from(exhausted);
                    log::error!("Intent classification unavailable: {}", failure);
                    OrchestratorError::ClassificationUnavailable {
                        attempts: failure.attempts(),
                        message: failure.to_string(),
                    }
                })?;

        let raw = match reply.as_str() {
            Some(text) => text.to_string(),
            None => reply.to_string(),
        };

        match Category::normalize(&raw) {
            Some(category) => {
                log::info!(
                    "Query classified as '{}' after {} attempt(s)",
                    category,
                    attempts
                );
                Ok(category)
            }
            None => {
                log::error!("Classifier reply '{}' does not name a category", raw);
                Err(OrchestratorError::ClassificationAmbiguous { raw })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capability::Capability;
    use crate::core::error::{CapabilityError, ErrorKind};
    use crate::core::signature::Signature;
    use crate::core::Payload;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails `failures` times, then answers with `reply`.
    struct ScriptedClassifier {
        reply: Payload,
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Capability for ScriptedClassifier {
        fn name(&self) -> &str {
            names::CLASSIFY_INTENT
        }

        fn signature(&self) -> Signature {
            "query -> category".parse().unwrap()
        }

        async fn execute(&self, input: &CapabilityInput) -> Result<Payload, CapabilityError> {
            input.str(slots::QUERY)?;
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(CapabilityError::Collaborator("model offline".into()));
            }
            Ok(self.reply.clone())
        }
    }

    fn classifier(reply: Payload, failures: u32) -> (IntentClassifier, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let registry = CapabilityRegistry::builder()
            .register(ScriptedClassifier {
                reply,
                failures,
                calls: calls.clone(),
            })
            .build();
        let retry = RetryPolicy::default().with_max_attempts(3).without_backoff();
        (
            IntentClassifier::new(registry, retry, Duration::from_secs(1)),
            calls,
        )
    }

    #[tokio::test]
    async fn test_classify_normalizes_reply() {
        let (classifier, _) = classifier(json!("  Both\n"), 0);
        assert_eq!(classifier.classify("owner and formulas?").await, Ok(Category::Both));
    }

    #[tokio::test]
    async fn test_classify_retries_until_available() {
        let (classifier, calls) = classifier(json!("code"), 2);
        assert_eq!(classifier.classify("write a script").await, Ok(Category::Code));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_classify_unavailable_after_retries() {
        let (classifier, calls) = classifier(json!("code"), 10);
        let err = classifier.classify("write a script").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClassificationUnavailable);
        assert!(matches!(
            err,
            OrchestratorError::ClassificationUnavailable { attempts: 3, .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unknown_reply_is_ambiguous_and_not_retried() {
        let (classifier, calls) = classifier(json!("probably metadata"), 0);
        let err = classifier.classify("who owns it").await.unwrap_err();
        assert_eq!(
            err,
            OrchestratorError::ClassificationAmbiguous {
                raw: "probably metadata".into()
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_text_reply_is_ambiguous() {
        let (classifier, _) = classifier(json!({"category": "code"}), 0);
        let err = classifier.classify("q").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClassificationAmbiguous);
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected_without_calls() {
        let (classifier, calls) = classifier(json!("code"), 0);
        assert_eq!(
            classifier.classify("   ").await,
            Err(OrchestratorError::EmptyQuery)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_capability_is_unavailable() {
        let classifier = IntentClassifier::new(
            CapabilityRegistry::builder().build(),
            RetryPolicy::none(),
            Duration::from_secs(1),
        );
        let err = classifier.classify("q").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClassificationUnavailable);
    }
}
