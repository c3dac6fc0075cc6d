use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

use crate::core::error::CapabilityError;
use crate::core::signature::Signature;
use crate::core::Payload;

/// Registry names of the standard capabilities.
pub mod names {
    pub const CLASSIFY_INTENT: &str = "classify_intent";
    pub const FETCH_METADATA: &str = "fetch_metadata";
    pub const FETCH_TECHNICAL: &str = "fetch_technical";
    pub const SUMMARIZE: &str = "summarize";
    pub const GENERATE_CODE: &str = "generate_code";
}

/// Input slot names shared by the standard capabilities.
pub mod slots {
    pub const QUERY: &str = "query";
    pub const METADATA: &str = "metadata";
    pub const TECHNICAL: &str = "technical";
}

/// A named unit of work with a fixed input/output contract.
///
/// Implementations are registered once in a
/// [`CapabilityRegistry`](crate::core::registry::CapabilityRegistry) and then
/// invoked concurrently by the executor, so `execute` must only read `self`.
/// It may call external services.
#[async_trait]
pub trait Capability: Send + Sync + 'static {
    /// The registry key, also what work items refer to.
    fn name(&self) -> &str;

    /// The declared input slots and output fields.
    fn signature(&self) -> Signature;

    /// Runs the capability against fully resolved inputs.
    async fn execute(&self, input: &CapabilityInput) -> Result<Payload, CapabilityError>;
}

/// Resolved input slots handed to a capability: every reference has already
/// been replaced by the upstream item's completed result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityInput {
    slots: BTreeMap<String, Payload>,
}

impl CapabilityInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, slot: impl Into<String>, value: impl Into<Payload>) -> Self {
        self.insert(slot, value);
        self
    }

    pub fn insert(&mut self, slot: impl Into<String>, value: impl Into<Payload>) {
        self.slots.insert(slot.into(), value.into());
    }

    pub fn get(&self, slot: &str) -> Result<&Payload, CapabilityError> {
        self.slots
            .get(slot)
            .ok_or_else(|| CapabilityError::MissingInput(slot.to_string()))
    }

    pub fn str(&self, slot: &str) -> Result<&str, CapabilityError> {
        self.get(slot)?
            .as_str()
            .ok_or_else(|| CapabilityError::InvalidInput {
                slot: slot.to_string(),
                reason: "expected a string".to_string(),
            })
    }

    /// Decodes a slot into a typed payload.
    pub fn decode<T: DeserializeOwned>(&self, slot: &str) -> Result<T, CapabilityError> {
        serde_json::from_value(self.get(slot)?.clone()).map_err(|e| {
            CapabilityError::InvalidInput {
                slot: slot.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// All slots as one JSON object, for traces.
    pub fn to_payload(&self) -> Payload {
        Payload::Object(
            self.slots
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
