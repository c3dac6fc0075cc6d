use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::core::work_item::ItemId;

/// Flat tag for every failure the orchestrator can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidQuery,
    ClassificationAmbiguous,
    ClassificationUnavailable,
    GraphInvalid,
    CapabilityFailure,
    Timeout,
    Cancelled,
    Skipped,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ErrorKind::InvalidQuery => "invalid_query",
            ErrorKind::ClassificationAmbiguous => "classification_ambiguous",
            ErrorKind::ClassificationUnavailable => "classification_unavailable",
            ErrorKind::GraphInvalid => "graph_invalid",
            ErrorKind::CapabilityFailure => "capability_failure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Skipped => "skipped",
        };
        f.write_str(tag)
    }
}

/// Error raised by a single capability invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("collaborator error: {0}")]
    Collaborator(String),

    #[error("missing input slot '{0}'")]
    MissingInput(String),

    #[error("input slot '{slot}' has the wrong shape: {reason}")]
    InvalidInput { slot: String, reason: String },
}

impl CapabilityError {
    /// Shape errors are contract violations and repeat identically on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CapabilityError::Collaborator(_))
    }
}

/// Why a work item did not complete.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ItemFailure {
    #[error("{message} (after {attempts} attempt(s))")]
    CapabilityFailure { message: String, attempts: u32 },

    #[error("no result within {timeout:?} (after {attempts} attempt(s))")]
    Timeout { timeout: Duration, attempts: u32 },

    #[error("skipped because upstream '{upstream}' did not complete: {cause}")]
    Skipped {
        upstream: ItemId,
        cause: Box<ItemFailure>,
    },
}

impl ItemFailure {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ItemFailure::CapabilityFailure { .. } => ErrorKind::CapabilityFailure,
            ItemFailure::Timeout { .. } => ErrorKind::Timeout,
            ItemFailure::Skipped { .. } => ErrorKind::Skipped,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ItemFailure::CapabilityFailure { attempts, .. } => *attempts,
            ItemFailure::Timeout { attempts, .. } => *attempts,
            ItemFailure::Skipped { .. } => 0,
        }
    }

    /// The failure that started a skip chain, or `self` when it is not a skip.
    pub fn root_cause(&self) -> &ItemFailure {
        match self {
            ItemFailure::Skipped { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// The item whose own failure started a skip chain.
    pub fn origin(&self) -> Option<&ItemId> {
        match self {
            ItemFailure::Skipped { upstream, cause } => match cause.as_ref() {
                ItemFailure::Skipped { .. } => cause.origin(),
                _ => Some(upstream),
            },
            _ => None,
        }
    }
}

/// Failure of a whole executor run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("graph invalid: {}", .0.join("; "))]
    GraphInvalid(Vec<String>),

    #[error("execution cancelled")]
    Cancelled,

    /// A terminal did not complete. `stage` is the item that actually failed,
    /// which differs from `terminal` when the terminal was skipped.
    #[error("stage '{stage}' ({capability}) failed: {failure}")]
    Failed {
        terminal: ItemId,
        stage: ItemId,
        capability: String,
        failure: ItemFailure,
    },
}

impl ExecutionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutionError::GraphInvalid(_) => ErrorKind::GraphInvalid,
            ExecutionError::Cancelled => ErrorKind::Cancelled,
            ExecutionError::Failed { failure, .. } => failure.kind(),
        }
    }

    pub fn stage(&self) -> String {
        match self {
            ExecutionError::GraphInvalid(_) => "graph".to_string(),
            ExecutionError::Cancelled => "execution".to_string(),
            ExecutionError::Failed { stage, .. } => stage.to_string(),
        }
    }
}

/// Fatal outcome of handling one query end to end.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestratorError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("classifier reply '{raw}' does not name a known category")]
    ClassificationAmbiguous { raw: String },

    #[error("classifier unavailable after {attempts} attempt(s): {message}")]
    ClassificationUnavailable { attempts: u32, message: String },

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::EmptyQuery => ErrorKind::InvalidQuery,
            OrchestratorError::ClassificationAmbiguous { .. } => {
                ErrorKind::ClassificationAmbiguous
            }
            OrchestratorError::ClassificationUnavailable { .. } => {
                ErrorKind::ClassificationUnavailable
            }
            OrchestratorError::Execution(e) => e.kind(),
        }
    }

    /// The pipeline stage that failed, for user-facing reports.
    pub fn stage(&self) -> String {
        match self {
            OrchestratorError::EmptyQuery => "input".to_string(),
            OrchestratorError::ClassificationAmbiguous { .. }
            | OrchestratorError::ClassificationUnavailable { .. } => {
                "classification".to_string()
            }
            OrchestratorError::Execution(e) => e.stage(),
        }
    }
}
