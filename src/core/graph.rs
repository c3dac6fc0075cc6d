use std::collections::HashMap;
use uuid::Uuid;

use crate::core::work_item::{ItemId, ItemState, WorkItem};
use crate::core::Payload;

/// The acyclic set of work items built for one query.
///
/// A graph owns its items exclusively and is single-use: once an executor has
/// run it, running it again is rejected.
#[derive(Debug)]
pub struct WorkGraph {
    id: Uuid,
    items: Vec<WorkItem>,
    terminals: Vec<ItemId>,
}

/// The comparable shape of a graph: nodes, edges and terminals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// `(item, capability)` in insertion order.
    pub nodes: Vec<(ItemId, String)>,
    /// `(upstream, downstream)`, sorted.
    pub edges: Vec<(ItemId, ItemId)>,
    pub terminals: Vec<ItemId>,
}

impl Default for WorkGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkGraph {
    pub fn new() -> Self {
        WorkGraph {
            id: Uuid::new_v4(),
            items: Vec::new(),
            terminals: Vec::new(),
        }
    }

    /// Appends an item. Insertion order is the tie-break for scheduling.
    pub fn with_item(mut self, item: WorkItem) -> Self {
        self.push(item);
        self
    }

    /// Marks an item as terminal: its result is part of the final output.
    pub fn with_terminal(mut self, id: impl Into<ItemId>) -> Self {
        let id = id.into();
        if !self.terminals.contains(&id) {
            self.terminals.push(id);
        }
        self
    }

    pub fn push(&mut self, item: WorkItem) {
        self.items.push(item);
    }

    /// Per-instance identity, used for log correlation only.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn terminals(&self) -> &[ItemId] {
        &self.terminals
    }

    pub fn item(&self, id: &ItemId) -> Option<&WorkItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub(crate) fn item_at_mut(&mut self, index: usize) -> &mut WorkItem {
        &mut self.items[index]
    }

    /// Maps each item id to its position. Later duplicates shadow earlier ones;
    /// validation reports duplicates before this is relied upon.
    pub(crate) fn index(&self) -> HashMap<&ItemId, usize> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id(), i))
            .collect()
    }

    /// The completed result of an item, if it has one.
    pub fn result(&self, id: &ItemId) -> Option<&Payload> {
        match self.item(id)?.state() {
            ItemState::Completed(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn topology(&self) -> Topology {
        let nodes = self
            .items
            .iter()
            .map(|item| (item.id().clone(), item.capability().to_string()))
            .collect();

        let mut edges: Vec<(ItemId, ItemId)> = self
            .items
            .iter()
            .flat_map(|item| {
                item.dependencies()
                    .into_iter()
                    .map(move |upstream| (upstream.clone(), item.id().clone()))
            })
            .collect();
        edges.sort();

        Topology {
            nodes,
            edges,
            terminals: self.terminals.clone(),
        }
    }
}
