use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

use crate::core::error::ItemFailure;
use crate::core::Payload;

/// Identity of a work item, unique within its graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        ItemId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        ItemId(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        ItemId(id)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What feeds one named input slot of a work item.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSlot {
    /// Passed to the capability as-is.
    Literal(Payload),
    /// Resolved to the completed result of another item in the same graph.
    Ref(ItemId),
}

/// Lifecycle of a work item.
///
/// `Pending -> Running -> {Completed | Failed}`, or `Pending -> Skipped`
/// when an ancestor did not complete. Nothing ever returns to `Pending`.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemState {
    Pending,
    Running,
    Completed(Payload),
    Failed(ItemFailure),
    Skipped(ItemFailure),
}

/// Data-free view of [`ItemState`], handy for assertions and traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl ItemState {
    pub fn status(&self) -> ItemStatus {
        match self {
            ItemState::Pending => ItemStatus::Pending,
            ItemState::Running => ItemStatus::Running,
            ItemState::Completed(_) => ItemStatus::Completed,
            ItemState::Failed(_) => ItemStatus::Failed,
            ItemState::Skipped(_) => ItemStatus::Skipped,
        }
    }

    /// The failure recorded for a failed or skipped item.
    pub fn failure(&self) -> Option<&ItemFailure> {
        match self {
            ItemState::Failed(f) | ItemState::Skipped(f) => Some(f),
            _ => None,
        }
    }
}

/// One bound invocation of a capability inside a single graph.
///
/// Not `Clone`: each item belongs to exactly one graph.
#[derive(Debug)]
pub struct WorkItem {
    id: ItemId,
    capability: String,
    inputs: BTreeMap<String, InputSlot>,
    state: ItemState,
    attempts: u32,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

impl WorkItem {
    pub fn new(id: impl Into<ItemId>, capability: impl Into<String>) -> Self {
        WorkItem {
            id: id.into(),
            capability: capability.into(),
            inputs: BTreeMap::new(),
            state: ItemState::Pending,
            attempts: 0,
            started_at: None,
            finished_at: None,
        }
    }

    /// Binds a literal value to an input slot.
    pub fn with_literal(mut self, slot: impl Into<String>, value: impl Into<Payload>) -> Self {
        self.bind(slot.into(), InputSlot::Literal(value.into()));
        self
    }

    /// Binds an input slot to the output of `upstream`.
    pub fn with_ref(mut self, slot: impl Into<String>, upstream: impl Into<ItemId>) -> Self {
        self.bind(slot.into(), InputSlot::Ref(upstream.into()));
        self
    }

    fn bind(&mut self, slot: String, input: InputSlot) {
        if self.inputs.contains_key(&slot) {
            log::warn!(
                "Input slot '{}' of item '{}' was already bound, overwriting.",
                slot,
                self.id
            );
        }
        self.inputs.insert(slot, input);
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn inputs(&self) -> &BTreeMap<String, InputSlot> {
        &self.inputs
    }

    pub fn state(&self) -> &ItemState {
        &self.state
    }

    pub fn status(&self) -> ItemStatus {
        self.state.status()
    }

    /// Invocations made, retries included. Zero until the item has run.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<Instant> {
        self.finished_at
    }

    /// The distinct upstream items this one references.
    pub fn dependencies(&self) -> BTreeSet<&ItemId> {
        self.inputs
            .values()
            .filter_map(|slot| match slot {
                InputSlot::Ref(id) => Some(id),
                InputSlot::Literal(_) => None,
            })
            .collect()
    }

    pub(crate) fn mark_running(&mut self, at: Instant) -> bool {
        if !self.expect_state(ItemStatus::Pending, ItemStatus::Running) {
            return false;
        }
        self.state = ItemState::Running;
        self.started_at = Some(at);
        true
    }

    pub(crate) fn mark_completed(&mut self, payload: Payload, attempts: u32, at: Instant) -> bool {
        if !self.expect_state(ItemStatus::Running, ItemStatus::Completed) {
            return false;
        }
        self.state = ItemState::Completed(payload);
        self.attempts = attempts;
        self.finished_at = Some(at);
        true
    }

    pub(crate) fn mark_failed(&mut self, failure: ItemFailure, at: Instant) -> bool {
        if !self.expect_state(ItemStatus::Running, ItemStatus::Failed) {
            return false;
        }
        self.attempts = failure.attempts();
        self.state = ItemState::Failed(failure);
        self.finished_at = Some(at);
        true
    }

    pub(crate) fn mark_skipped(&mut self, failure: ItemFailure) -> bool {
        if !self.expect_state(ItemStatus::Pending, ItemStatus::Skipped) {
            return false;
        }
        self.state = ItemState::Skipped(failure);
        true
    }

    fn expect_state(&self, expected: ItemStatus, target: ItemStatus) -> bool {
        let current = self.status();
        if current != expected {
            log::error!(
                "Illegal transition for item '{}': {:?} -> {:?}",
                self.id,
                current,
                target
            );
            return false;
        }
        true
    }
}
