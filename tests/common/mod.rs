//! Shared mock collaborators for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use euda_orchestrator::capabilities::{
    CodePayload, CollaboratorError, Collaborators, MetadataPayload, SummaryPayload,
    TechnicalPayload,
};
use euda_orchestrator::{ExecutorConfig, OrchestratorConfig, RetryPolicy};

/// One collaborator invocation, with its wall-clock span.
#[derive(Debug, Clone)]
pub struct Call {
    pub name: &'static str,
    pub started: Instant,
    pub finished: Instant,
}

/// Deterministic collaborators: fixed classifier reply, canned payloads,
/// optional per-role failure and artificial latency.
pub struct ScriptedCollaborators {
    category: String,
    failing: HashSet<&'static str>,
    delay: Duration,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedCollaborators {
    pub fn new(category: &str) -> Self {
        ScriptedCollaborators {
            category: category.to_string(),
            failing: HashSet::new(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call to `name` fails with a collaborator error.
    pub fn failing(mut self, name: &'static str) -> Self {
        self.failing.insert(name);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.name == name).count()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.calls().iter().map(|c| c.name).collect()
    }

    async fn step(&self, name: &'static str) -> Result<(), CollaboratorError> {
        let started = Instant::now();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls.lock().unwrap().push(Call {
            name,
            started,
            finished: Instant::now(),
        });
        if self.failing.contains(name) {
            Err(CollaboratorError::new(format!("{} service unavailable", name)))
        } else {
            Ok(())
        }
    }
}

pub fn metadata_for(query: &str) -> MetadataPayload {
    MetadataPayload {
        content: format!("metadata about '{}'", query),
    }
}

pub fn technical_for(query: &str) -> TechnicalPayload {
    TechnicalPayload {
        content: format!("technical details of '{}'", query),
    }
}

pub fn code_for(technical: &TechnicalPayload, query: &str) -> CodePayload {
    CodePayload {
        language: "python".to_string(),
        code: format!("# {}\n# based on: {}\nimport pandas as pd\n", query, technical.content),
    }
}

#[async_trait]
impl Collaborators for ScriptedCollaborators {
    async fn fetch_metadata(&self, query: &str) -> Result<MetadataPayload, CollaboratorError> {
        self.step("fetch_metadata").await?;
        Ok(metadata_for(query))
    }

    async fn fetch_technical(&self, query: &str) -> Result<TechnicalPayload, CollaboratorError> {
        self.step("fetch_technical").await?;
        Ok(technical_for(query))
    }

    async fn summarize(
        &self,
        metadata: &MetadataPayload,
        technical: &TechnicalPayload,
    ) -> Result<SummaryPayload, CollaboratorError> {
        self.step("summarize").await?;
        Ok(SummaryPayload {
            summary: format!("{} / {}", metadata.content, technical.content),
        })
    }

    async fn generate_code(
        &self,
        technical: &TechnicalPayload,
        query: &str,
    ) -> Result<CodePayload, CollaboratorError> {
        self.step("generate_code").await?;
        Ok(code_for(technical, query))
    }

    async fn classify_intent(&self, _query: &str) -> Result<String, CollaboratorError> {
        self.step("classify_intent").await?;
        Ok(self.category.clone())
    }
}

/// Default limits with millisecond backoff so retry paths stay fast.
pub fn fast_config() -> OrchestratorConfig {
    let retry = RetryPolicy::default()
        .with_backoff(Duration::from_millis(1), Duration::from_millis(4));
    OrchestratorConfig {
        executor: ExecutorConfig {
            retry: retry.clone(),
            ..Default::default()
        },
        classifier_retry: retry,
        classifier_timeout: Duration::from_secs(5),
    }
}
