pub mod builder;
pub mod capability;
pub mod category;
pub mod classifier;
pub mod error;
pub mod executor;
pub mod graph;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod signature;
pub mod telemetry;
pub mod validation;
pub mod work_item;

/// The opaque value passed between work items.
pub type Payload = serde_json::Value;
