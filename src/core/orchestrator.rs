use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::core::builder::GraphBuilder;
use crate::core::category::Category;
use crate::core::classifier::IntentClassifier;
use crate::core::error::{ExecutionError, OrchestratorError};
use crate::core::executor::{Executor, ExecutorConfig};
use crate::core::registry::CapabilityRegistry;
use crate::core::retry::RetryPolicy;
use crate::core::telemetry::Telemetry;
use crate::core::Payload;

const DEFAULT_CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub executor: ExecutorConfig,
    pub classifier_retry: RetryPolicy,
    pub classifier_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            executor: ExecutorConfig::default(),
            classifier_retry: RetryPolicy::default(),
            classifier_timeout: DEFAULT_CLASSIFIER_TIMEOUT,
        }
    }
}

/// The answer to one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub category: Category,
    pub payload: Payload,
}

/// Query -> classify -> build graph -> execute, one shot per query.
///
/// Composition is strictly top-down: the executor never sees the classifier
/// or the builder.
#[derive(Clone)]
pub struct Orchestrator {
    classifier: IntentClassifier,
    builder: GraphBuilder,
    executor: Executor,
}

impl Orchestrator {
    pub fn new(registry: CapabilityRegistry, config: OrchestratorConfig) -> Self {
        Orchestrator {
            classifier: IntentClassifier::new(
                registry.clone(),
                config.classifier_retry,
                config.classifier_timeout,
            ),
            builder: GraphBuilder::new(),
            executor: Executor::new(registry, config.executor),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.executor = self.executor.with_telemetry(telemetry);
        self
    }

    pub async fn handle(&self, query: &str) -> Result<Outcome, OrchestratorError> {
        self.handle_with_cancel(query, &CancellationToken::new()).await
    }

    pub async fn handle_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Outcome, OrchestratorError> {
        if cancel.is_cancelled() {
            log::warn!("Cancelled before classification");
            return Err(ExecutionError::Cancelled.into());
        }
        let category = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::warn!("Cancelled during classification");
                return Err(ExecutionError::Cancelled.into());
            }
            category = self.classifier.classify(query) => category?,
        };

        let graph = self.builder.build(category, query);
        log::info!(
            "[{}] Built '{}' graph with {} item(s)",
            graph.id(),
            category,
            graph.len()
        );

        let payload = self.executor.run_with_cancel(graph, cancel).await?;
        Ok(Outcome { category, payload })
    }
}
