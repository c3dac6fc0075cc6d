use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::core::error::ExecutionError;
use crate::core::graph::WorkGraph;
use crate::core::registry::CapabilityRegistry;
use crate::core::work_item::{ItemId, ItemStatus};

/// Represents an issue found while validating a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// A hard error: the graph cannot be executed.
    Error(String),
    /// A warning: the graph runs, but something about it looks unintended.
    Warning(String),
}

/// The result of a validation pass, with the execution order when acyclic.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
    /// Item positions in a valid topological order; empty when a cycle exists.
    pub order: Vec<usize>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.issues.push(ValidationIssue::Error(msg.into()));
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.issues.push(ValidationIssue::Warning(msg.into()));
    }

    pub fn is_safe(&self) -> bool {
        !self.issues.iter().any(|i| matches!(i, ValidationIssue::Error(_)))
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| matches!(i, ValidationIssue::Warning(_)))
    }

    pub fn errors(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                ValidationIssue::Error(msg) => Some(msg.clone()),
                ValidationIssue::Warning(_) => None,
            })
            .collect()
    }

    pub fn log_summary(&self) {
        for issue in &self.issues {
            match issue {
                ValidationIssue::Error(msg) => log::error!("Graph validation error: {}", msg),
                ValidationIssue::Warning(msg) => log::warn!("Graph validation warning: {}", msg),
            }
        }
    }

    /// Converts into the execution order, or `GraphInvalid` listing every error.
    pub fn into_order(self) -> Result<Vec<usize>, ExecutionError> {
        if self.is_safe() {
            Ok(self.order)
        } else {
            Err(ExecutionError::GraphInvalid(self.errors()))
        }
    }
}

/// Checks everything that must hold before a single capability is invoked.
pub fn validate(graph: &WorkGraph, registry: &CapabilityRegistry) -> ValidationResult {
    let mut result = ValidationResult::new();

    if graph.is_empty() {
        result.add_error("graph has no work items");
        return result;
    }
    if graph.terminals().is_empty() {
        result.add_error("graph declares no terminal item");
    }

    let mut seen = HashSet::new();
    for item in graph.items() {
        if !seen.insert(item.id()) {
            result.add_error(format!("item id '{}' is used more than once", item.id()));
        }
    }

    for terminal in graph.terminals() {
        if !seen.contains(terminal) {
            result.add_error(format!("terminal '{}' is not an item of this graph", terminal));
        }
    }

    for item in graph.items() {
        if item.status() != ItemStatus::Pending {
            result.add_error(format!(
                "item '{}' is {:?}; graphs are single-use",
                item.id(),
                item.status()
            ));
        }

        for upstream in item.dependencies() {
            if !seen.contains(upstream) {
                result.add_error(format!(
                    "item '{}' references unknown item '{}'",
                    item.id(),
                    upstream
                ));
            }
        }

        match registry.get(item.capability()) {
            None => result.add_error(format!(
                "item '{}' uses unregistered capability '{}'",
                item.id(),
                item.capability()
            )),
            Some(capability) => {
                let signature = capability.signature();
                let declared: BTreeSet<&str> = signature.input_names().collect();
                let bound: BTreeSet<&str> = item.inputs().keys().map(String::as_str).collect();
                for missing in declared.difference(&bound) {
                    result.add_error(format!(
                        "item '{}' leaves input '{}' of '{}' unbound",
                        item.id(),
                        missing,
                        item.capability()
                    ));
                }
                for extra in bound.difference(&declared) {
                    result.add_error(format!(
                        "item '{}' binds '{}', which '{}' does not declare",
                        item.id(),
                        extra,
                        item.capability()
                    ));
                }
            }
        }
    }

    match topological_order(graph) {
        Ok(order) => {
            warn_unreachable(graph, &mut result);
            result.order = order;
        }
        Err(cycle) => {
            let names: Vec<String> = cycle.iter().map(ItemId::to_string).collect();
            result.add_error(format!("dependency cycle among [{}]", names.join(", ")));
        }
    }

    result
}

/// Kahn's algorithm over item positions, stable on insertion order.
///
/// References to unknown items are ignored here; [`validate`] reports them.
/// On a cycle, returns the items that could never become ready.
pub fn topological_order(graph: &WorkGraph) -> Result<Vec<usize>, Vec<ItemId>> {
    let index = graph.index();
    let n = graph.len();
    let mut in_degree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (i, item) in graph.items().iter().enumerate() {
        for upstream in item.dependencies() {
            if let Some(&u) = index.get(upstream) {
                in_degree[i] += 1;
                dependents[u].push(i);
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(node) = queue.pop_front() {
        order.push(node);
        for &next in &dependents[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() < n {
        let stuck = (0..n)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| graph.items()[i].id().clone())
            .collect();
        return Err(stuck);
    }

    Ok(order)
}

/// Items that feed no terminal still run, but their results are discarded.
fn warn_unreachable(graph: &WorkGraph, result: &mut ValidationResult) {
    let index = graph.index();
    let mut needed: HashSet<usize> = HashSet::new();
    let mut stack: Vec<usize> = graph
        .terminals()
        .iter()
        .filter_map(|t| index.get(t).copied())
        .collect();

    while let Some(i) = stack.pop() {
        if needed.insert(i) {
            for upstream in graph.items()[i].dependencies() {
                if let Some(&u) = index.get(upstream) {
                    stack.push(u);
                }
            }
        }
    }

    let by_pos: HashMap<usize, &ItemId> = index.iter().map(|(id, &i)| (i, *id)).collect();
    for i in 0..graph.len() {
        if !needed.contains(&i) {
            if let Some(id) = by_pos.get(&i) {
                result.add_warning(format!("item '{}' does not feed any terminal", id));
            }
        }
    }
}
