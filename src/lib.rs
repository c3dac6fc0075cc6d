//! # EUDA Orchestrator
//!
//! An intent-driven workflow orchestrator for questions about Excel End User
//! Developed Applications (EUDAs).
//!
//! ## Features
//!
//! - **Intent classification**: every query is routed to one of four categories
//!   (metadata, technical, both, code) before any work is planned
//! - **Fixed graph topologies**: each category maps to a deterministic graph of work items
//! - **Concurrent execution**: independent items run in parallel waves, dependents
//!   start only once their upstreams complete
//! - **Failure isolation**: per-item timeouts, bounded retries with backoff, skip
//!   propagation and cooperative cancellation
//! - **Optional LLM Integration**: Ollama-backed collaborators (feature-gated)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use euda_orchestrator::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo(collaborators: Arc<dyn Collaborators>) -> Result<(), OrchestratorError> {
//! let registry = standard_registry(collaborators);
//! let orchestrator = Orchestrator::new(registry, OrchestratorConfig::default());
//!
//! let outcome = orchestrator.handle("Who owns the budget workbook?").await?;
//! println!("{:?}: {}", outcome.category, outcome.payload);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`category`], [`classifier`]: the closed set of intents and how a query is mapped to one
//! - [`work_item`], [`graph`], [`builder`]: the unit of work and the graphs built from them
//! - [`validation`], [`executor`], [`retry`]: graph checks and dependency-ordered execution
//! - [`capabilities`]: the standard capabilities and the [`Collaborators`] contract behind them
//! - [`config`]: TOML configuration
//! - [`prelude`]: Commonly used types and traits (import with `use euda_orchestrator::prelude::*`)

// ============================================================================
// Core Module
// ============================================================================

mod core;

pub use core::{
    builder, capability, category, classifier, error, executor, graph, orchestrator, registry,
    retry, signature, telemetry, validation, work_item, Payload,
};

pub mod capabilities;
pub mod config;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

// Model
pub use core::category::Category;
pub use core::graph::{Topology, WorkGraph};
pub use core::work_item::{InputSlot, ItemId, ItemState, ItemStatus, WorkItem};

// Capabilities
pub use core::capability::{Capability, CapabilityInput};
pub use core::registry::{CapabilityRegistry, RegistryBuilder};
pub use core::signature::{Field, Signature};

// Pipeline
pub use core::builder::GraphBuilder;
pub use core::classifier::IntentClassifier;
pub use core::executor::{CancelPolicy, ExecutionResult, Executor, ExecutorConfig};
pub use core::orchestrator::{Orchestrator, OrchestratorConfig, Outcome};
pub use core::retry::RetryPolicy;

// Errors
pub use core::error::{CapabilityError, ErrorKind, ExecutionError, ItemFailure, OrchestratorError};

// Observability
pub use core::telemetry::{LogTelemetry, MemoryTelemetry, Telemetry, TraceEntry};

pub use capabilities::{standard_registry, CollaboratorError, Collaborators};
pub use config::{Config, ConfigError};

// ============================================================================
// Prelude Module - Convenient Bulk Imports
// ============================================================================

/// The main prelude: imports everything needed to wire and run an orchestrator.
///
/// # Example
/// ```rust
/// use euda_orchestrator::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        standard_registry,
        // Model
        Category,
        // Capabilities
        Capability,
        CapabilityError,
        CapabilityInput,
        CapabilityRegistry,
        CollaboratorError,
        Collaborators,
        // Pipeline
        Executor,
        ExecutorConfig,
        ItemId,
        Orchestrator,
        OrchestratorConfig,
        OrchestratorError,
        Outcome,
        Payload,
        RetryPolicy,
        Signature,
        WorkGraph,
        WorkItem,
    };
    pub use tokio_util::sync::CancellationToken;
}

// ============================================================================
// LLM Feature
// ============================================================================

#[cfg(feature = "llm")]
pub mod llm;

#[cfg(feature = "llm")]
pub use llm::{error::LLMError, Client, LlmCollaborators};

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
