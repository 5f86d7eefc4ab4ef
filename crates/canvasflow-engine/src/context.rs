use std::collections::HashMap;

use serde_json::Value;

use canvasflow_core::error::Result;
use canvasflow_core::event::EventEmitter;
use canvasflow_core::types::{ExecutionEvent, HandlerOutput, LogEntry, Node};

/// Final state of a node within one run.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// No incoming edge carried a live value; the handler never ran.
    Skipped,
    /// The handler ran and returned this output.
    Completed(HandlerOutput),
}

impl Resolution {
    /// The produced value, if the node ran.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Completed(output) => Some(&output.value),
            Self::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Per-run mutable state: the memo table, the execution log and the event
/// sink.
///
/// Created fresh for every run and never shared between runs.
pub struct ExecutionContext {
    results: HashMap<String, Resolution>,
    log: Vec<LogEntry>,
    emitter: EventEmitter,
}

impl ExecutionContext {
    pub fn new(emitter: EventEmitter) -> Self {
        Self {
            results: HashMap::new(),
            log: Vec::new(),
            emitter,
        }
    }

    pub fn result(&self, node_id: &str) -> Option<&Resolution> {
        self.results.get(node_id)
    }

    pub(crate) fn record_skip(&mut self, node_id: &str) {
        self.results.insert(node_id.to_string(), Resolution::Skipped);
    }

    pub(crate) fn record_success(&mut self, node: &Node, output: HandlerOutput) {
        self.log.push(LogEntry::success(node, &output));
        self.results
            .insert(node.id.clone(), Resolution::Completed(output));
    }

    pub(crate) fn record_failure(&mut self, node: &Node, message: &str) {
        self.log.push(LogEntry::failure(node, message));
    }

    pub async fn emit(&self, event: ExecutionEvent) -> Result<()> {
        self.emitter.emit(event).await
    }

    /// Entries in completion order.
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn into_log(self) -> Vec<LogEntry> {
        self.log
    }
}
