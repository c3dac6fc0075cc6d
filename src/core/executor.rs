use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::capability::CapabilityInput;
use crate::core::error::{ExecutionError, ItemFailure};
use crate::core::graph::WorkGraph;
use crate::core::registry::CapabilityRegistry;
use crate::core::retry::{self, RetryPolicy};
use crate::core::telemetry::{Telemetry, TraceEntry};
use crate::core::validation;
use crate::core::work_item::{InputSlot, ItemId, ItemState, ItemStatus, WorkItem};
use crate::core::Payload;

const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(60);

/// Final outcome for one terminal: its payload, or why it has none.
pub type ExecutionResult = Result<Payload, ExecutionError>;

/// What happens to in-flight items when a run is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelPolicy {
    /// Let in-flight items finish, then discard everything.
    #[default]
    Drain,
    /// Drop in-flight items immediately.
    Abandon,
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Applies to each attempt of each item separately.
    pub item_timeout: Duration,
    pub retry: RetryPolicy,
    pub cancel_policy: CancelPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            item_timeout: DEFAULT_ITEM_TIMEOUT,
            retry: RetryPolicy::default(),
            cancel_policy: CancelPolicy::default(),
        }
    }
}

/// Runs a [`WorkGraph`] to completion.
///
/// Execution proceeds in waves: every item whose upstream items have all
/// completed is dispatched concurrently, and the next wave is admitted only
/// once the whole current wave has settled. An item whose upstream failed or
/// was skipped is itself skipped without ever running; unrelated branches
/// carry on.
#[derive(Clone)]
pub struct Executor {
    registry: CapabilityRegistry,
    config: ExecutorConfig,
    telemetry: Option<Arc<dyn Telemetry>>,
}

impl Executor {
    pub fn new(registry: CapabilityRegistry, config: ExecutorConfig) -> Self {
        Executor {
            registry,
            config,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Runs a single-terminal graph and returns that terminal's result.
    pub async fn run(&self, graph: WorkGraph) -> ExecutionResult {
        self.run_with_cancel(graph, &CancellationToken::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        mut graph: WorkGraph,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        if graph.terminals().len() != 1 {
            return Err(ExecutionError::GraphInvalid(vec![format!(
                "run expects exactly one terminal, graph has {}; use run_all",
                graph.terminals().len()
            )]));
        }
        let mut results = self.execute(&mut graph, cancel).await?;
        let terminal = graph.terminals()[0].clone();
        results.remove(&terminal).unwrap_or_else(|| {
            Err(ExecutionError::GraphInvalid(vec![format!(
                "terminal '{}' produced no result",
                terminal
            )]))
        })
    }

    /// Runs a graph with any number of terminals.
    pub async fn run_all(
        &self,
        mut graph: WorkGraph,
    ) -> Result<BTreeMap<ItemId, ExecutionResult>, ExecutionError> {
        self.execute(&mut graph, &CancellationToken::new()).await
    }

    /// Runs `graph` in place, leaving every item's final state inspectable.
    ///
    /// Fails as a whole only for `GraphInvalid` (before anything runs) or
    /// `Cancelled`; otherwise each terminal gets its own result.
    pub async fn execute(
        &self,
        graph: &mut WorkGraph,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<ItemId, ExecutionResult>, ExecutionError> {
        let validation = validation::validate(graph, &self.registry);
        validation.log_summary();
        let order = validation.into_order()?;

        let graph_id = graph.id().to_string();
        log::info!("[{}] Executing {} work item(s)", graph_id, graph.len());

        let index: HashMap<ItemId, usize> = graph
            .items()
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id().clone(), i))
            .collect();
        let upstream: Vec<Vec<usize>> = graph
            .items()
            .iter()
            .map(|item| {
                item.dependencies()
                    .into_iter()
                    .filter_map(|id| index.get(id).copied())
                    .collect()
            })
            .collect();

        loop {
            if cancel.is_cancelled() {
                log::warn!("[{}] Cancelled, admitting no further items", graph_id);
                return Err(ExecutionError::Cancelled);
            }

            let ready = self.settle_skips(graph, &order, &upstream, &graph_id);
            if ready.is_empty() {
                break;
            }

            let mut dispatched = Vec::with_capacity(ready.len());
            for i in ready {
                let input = resolve_inputs(graph, i, &index)?;
                let item = graph.item_at_mut(i);
                let capability = self.registry.get(item.capability()).ok_or_else(|| {
                    ExecutionError::GraphInvalid(vec![format!(
                        "capability '{}' disappeared from the registry",
                        item.capability()
                    )])
                })?;
                item.mark_running(Instant::now());
                log::info!("[{}] Starting '{}' ({})", graph_id, item.id(), item.capability());
                dispatched.push((i, capability, input));
            }

            let wave: FuturesUnordered<_> = dispatched
                .into_iter()
                .map(|(i, capability, input)| async move {
                    let outcome = retry::invoke_with_retry(
                        capability.as_ref(),
                        &input,
                        &self.config.retry,
                        self.config.item_timeout,
                    )
                    .await;
                    (i, input, outcome, Instant::now())
                })
                .collect();

            let Some(settled) = self.join_wave(wave, cancel, &graph_id).await else {
                return Err(ExecutionError::Cancelled);
            };

            for (i, input, outcome, finished_at) in settled {
                let item = graph.item_at_mut(i);
                match outcome {
                    Ok((payload, attempts)) => {
                        log::info!(
                            "[{}] '{}' completed after {} attempt(s)",
                            graph_id,
                            item.id(),
                            attempts
                        );
                        item.mark_completed(payload, attempts, finished_at);
                    }
                    Err(exhausted) => {
                        let failure = ItemFailure::from(exhausted);
                        log::error!("[{}] '{}' failed: {}", graph_id, item.id(), failure);
                        item.mark_failed(failure, finished_at);
                    }
                }
                self.record(&graph_id, &graph.items()[i], input.to_payload());
            }
        }

        if let Some(t) = &self.telemetry {
            t.flush();
        }

        let graph: &WorkGraph = graph;
        Ok(graph
            .terminals()
            .iter()
            .map(|terminal| (terminal.clone(), terminal_result(graph, terminal)))
            .collect())
    }

    /// Walks pending items in topological order, skipping those with a
    /// failed or skipped upstream, and returns the ones ready to run.
    fn settle_skips(
        &self,
        graph: &mut WorkGraph,
        order: &[usize],
        upstream: &[Vec<usize>],
        graph_id: &str,
    ) -> Vec<usize> {
        let mut ready = Vec::new();

        for &i in order {
            if graph.items()[i].status() != ItemStatus::Pending {
                continue;
            }

            let mut blocked = false;
            let mut cause = None;
            for &u in &upstream[i] {
                let dep = &graph.items()[u];
                match dep.state() {
                    ItemState::Completed(_) => {}
                    ItemState::Failed(f) | ItemState::Skipped(f) => {
                        cause = Some(ItemFailure::Skipped {
                            upstream: dep.id().clone(),
                            cause: Box::new(f.clone()),
                        });
                        break;
                    }
                    ItemState::Pending | ItemState::Running => blocked = true,
                }
            }

            if let Some(failure) = cause {
                let item = graph.item_at_mut(i);
                log::warn!("[{}] Skipping '{}': {}", graph_id, item.id(), failure);
                item.mark_skipped(failure);
                self.record(graph_id, &graph.items()[i], Payload::Null);
            } else if !blocked {
                ready.push(i);
            }
        }

        ready
    }

    /// Waits for every future of a wave. `None` means the run was cancelled.
    async fn join_wave<F, T>(
        &self,
        mut wave: FuturesUnordered<F>,
        cancel: &CancellationToken,
        graph_id: &str,
    ) -> Option<Vec<T>>
    where
        F: Future<Output = T>,
    {
        let mut settled = Vec::with_capacity(wave.len());
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    match self.config.cancel_policy {
                        CancelPolicy::Abandon => {
                            log::warn!("[{}] Cancelled, abandoning {} in-flight item(s)", graph_id, wave.len());
                        }
                        CancelPolicy::Drain => {
                            log::warn!("[{}] Cancelled, draining {} in-flight item(s)", graph_id, wave.len());
                            while wave.next().await.is_some() {}
                        }
                    }
                    return None;
                }
                next = wave.next() => match next {
                    Some(result) => settled.push(result),
                    None => return Some(settled),
                },
            }
        }
    }

    fn record(&self, graph_id: &str, item: &WorkItem, inputs: Payload) {
        let Some(telemetry) = &self.telemetry else {
            return;
        };
        let signature_hash = self
            .registry
            .get(item.capability())
            .map(|c| c.signature().structural_hash())
            .unwrap_or_default();
        let (output, error) = match item.state() {
            ItemState::Completed(payload) => (Some(payload.clone()), None),
            ItemState::Failed(f) | ItemState::Skipped(f) => (None, Some(f.to_string())),
            ItemState::Pending | ItemState::Running => (None, None),
        };

        telemetry.record(TraceEntry {
            graph_id: graph_id.to_string(),
            item_id: item.id().clone(),
            capability: item.capability().to_string(),
            signature_hash,
            status: item.status(),
            attempts: item.attempts(),
            started_at: item.started_at(),
            finished_at: item.finished_at(),
            inputs,
            output,
            error,
        });
    }
}

/// Replaces every reference slot with the upstream item's completed result.
fn resolve_inputs(
    graph: &WorkGraph,
    i: usize,
    index: &HashMap<ItemId, usize>,
) -> Result<CapabilityInput, ExecutionError> {
    let item = &graph.items()[i];
    let mut input = CapabilityInput::new();

    for (slot, binding) in item.inputs() {
        match binding {
            InputSlot::Literal(value) => input.insert(slot.clone(), value.clone()),
            InputSlot::Ref(upstream) => {
                let value = index
                    .get(upstream)
                    .and_then(|&u| match graph.items()[u].state() {
                        ItemState::Completed(payload) => Some(payload.clone()),
                        _ => None,
                    })
                    .ok_or_else(|| {
                        ExecutionError::GraphInvalid(vec![format!(
                            "item '{}' was scheduled before upstream '{}' completed",
                            item.id(),
                            upstream
                        )])
                    })?;
                input.insert(slot.clone(), value);
            }
        }
    }

    Ok(input)
}

/// A skipped terminal reports the failure that started its skip chain.
fn terminal_result(graph: &WorkGraph, terminal: &ItemId) -> ExecutionResult {
    let Some(item) = graph.item(terminal) else {
        return Err(ExecutionError::GraphInvalid(vec![format!(
            "terminal '{}' is not an item of this graph",
            terminal
        )]));
    };

    match item.state() {
        ItemState::Completed(payload) => Ok(payload.clone()),
        ItemState::Failed(failure) => Err(ExecutionError::Failed {
            terminal: terminal.clone(),
            stage: terminal.clone(),
            capability: item.capability().to_string(),
            failure: failure.clone(),
        }),
        ItemState::Skipped(failure) => {
            let stage = failure.origin().cloned().unwrap_or_else(|| terminal.clone());
            let capability = graph
                .item(&stage)
                .map(|origin| origin.capability().to_string())
                .unwrap_or_default();
            Err(ExecutionError::Failed {
                terminal: terminal.clone(),
                stage,
                capability,
                failure: failure.root_cause().clone(),
            })
        }
        ItemState::Pending | ItemState::Running => Err(ExecutionError::GraphInvalid(vec![
            format!("terminal '{}' never ran", terminal),
        ])),
    }
}
