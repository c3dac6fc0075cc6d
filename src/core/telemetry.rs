use std::sync::Mutex;
use std::time::Instant;

use crate::core::work_item::{ItemId, ItemStatus};
use crate::core::Payload;

/// One settled work item, as seen by the executor.
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub graph_id: String,
    pub item_id: ItemId,
    pub capability: String,
    pub signature_hash: String,
    pub status: ItemStatus,
    pub attempts: u32,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    pub inputs: Payload,
    pub output: Option<Payload>,
    pub error: Option<String>,
}

/// Trait for recording execution traces.
pub trait Telemetry: Send + Sync {
    fn record(&self, entry: TraceEntry);
    fn flush(&self);
}

/// Simple in-memory collector for traces.
#[derive(Default)]
pub struct MemoryTelemetry {
    traces: Mutex<Vec<TraceEntry>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_traces(&self) -> Vec<TraceEntry> {
        self.traces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn find(&self, item: &str) -> Option<TraceEntry> {
        self.get_traces()
            .into_iter()
            .find(|entry| entry.item_id.as_str() == item)
    }
}

impl Telemetry for MemoryTelemetry {
    fn record(&self, entry: TraceEntry) {
        self.traces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    fn flush(&self) {
        // No-op for memory collector
    }
}

/// Writes each trace through the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn record(&self, entry: TraceEntry) {
        let elapsed = match (entry.started_at, entry.finished_at) {
            (Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
            _ => None,
        };
        log::debug!(
            "[{}] {} ({}) {:?} attempts={} elapsed={:?}{}",
            entry.graph_id,
            entry.item_id,
            entry.capability,
            entry.status,
            entry.attempts,
            elapsed,
            entry
                .error
                .as_deref()
                .map(|e| format!(" error={}", e))
                .unwrap_or_default()
        );
    }

    fn flush(&self) {}
}
