//! Mocks and fixtures shared by the canvasflow test suites.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

use canvasflow_core::config::ModelConfig;
use canvasflow_core::error::{FlowError, Result};
use canvasflow_core::traits::{LlmClient, NodeHandler};
use canvasflow_core::types::*;

// ── MockLlmClient ───────────────────────────────────────────────

/// Streams a fixed reply in word-sized chunks and records every request.
#[derive(Clone)]
pub struct MockLlmClient {
    reply: String,
    fail_with: Option<String>,
    requests: Arc<Mutex<Vec<(ModelConfig, Vec<ChatMessage>)>>>,
}

impl MockLlmClient {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            fail_with: None,
            requests: Arc::default(),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: String::new(),
            fail_with: Some(message.into()),
            requests: Arc::default(),
        }
    }

    /// Requests seen so far: the effective model config and the messages.
    pub fn requests(&self) -> Vec<(ModelConfig, Vec<ChatMessage>)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl LlmClient for MockLlmClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((config.clone(), messages));
        }
        Box::pin(async move {
            if let Some(message) = &self.fail_with {
                return Err(FlowError::LlmRequest(message.clone()));
            }
            let mut deltas: Vec<Result<StreamDelta>> = self
                .reply
                .split_inclusive(' ')
                .map(|chunk| Ok(StreamDelta::TextDelta(chunk.to_string())))
                .collect();
            deltas.push(Ok(StreamDelta::Stop(StopReason::EndTurn)));
            Ok(Box::pin(futures::stream::iter(deltas)) as BoxStream<'_, Result<StreamDelta>>)
        })
    }
}

// ── RecordingHandler ────────────────────────────────────────────

/// Returns a fixed output and records the inputs of every call.
#[derive(Clone)]
pub struct RecordingHandler {
    node_type: String,
    output: HandlerOutput,
    ports: &'static [&'static str],
    calls: Arc<Mutex<Vec<Vec<Value>>>>,
}

impl RecordingHandler {
    pub fn new(node_type: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            node_type: node_type.into(),
            output: HandlerOutput::value(value),
            ports: &[],
            calls: Arc::default(),
        }
    }

    /// A branching handler that always selects `port`.
    pub fn branching(node_type: impl Into<String>, value: impl Into<Value>, port: &str) -> Self {
        Self {
            node_type: node_type.into(),
            output: HandlerOutput::branch(value.into(), port),
            ports: &["true", "false"],
            calls: Arc::default(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Inputs of each call, in call order.
    pub fn calls(&self) -> Vec<Vec<Value>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl NodeHandler for RecordingHandler {
    fn node_type(&self) -> &str {
        &self.node_type
    }

    fn ports(&self) -> &[&'static str] {
        self.ports
    }

    fn execute(
        &self,
        inputs: Vec<Value>,
        _data: &Map<String, Value>,
    ) -> BoxFuture<'_, Result<HandlerOutput>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(inputs);
        }
        let output = self.output.clone();
        Box::pin(async move { Ok(output) })
    }
}

// ── FailingHandler ──────────────────────────────────────────────

/// Always fails with `Handler(message)`.
#[derive(Clone)]
pub struct FailingHandler {
    node_type: String,
    message: String,
    calls: Arc<AtomicUsize>,
}

impl FailingHandler {
    pub fn new(node_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            message: message.into(),
            calls: Arc::default(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl NodeHandler for FailingHandler {
    fn node_type(&self) -> &str {
        &self.node_type
    }

    fn execute(
        &self,
        _inputs: Vec<Value>,
        _data: &Map<String, Value>,
    ) -> BoxFuture<'_, Result<HandlerOutput>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let message = self.message.clone();
        Box::pin(async move { Err(FlowError::Handler(message)) })
    }
}

// ── Fixtures ────────────────────────────────────────────────────

/// A linear graph `ids[0] -> ids[1] -> ...`, every node of type `node_type`.
pub fn chain(node_type: &str, ids: &[&str]) -> Graph {
    let nodes = ids.iter().map(|id| Node::new(*id, node_type)).collect();
    let edges = ids.windows(2).map(|w| Edge::new(w[0], w[1])).collect();
    Graph::new(nodes, edges)
}

/// Compact trace of an event sequence, e.g. `["node_start:a", "complete"]`.
pub fn trace(events: &[ExecutionEvent]) -> Vec<String> {
    events
        .iter()
        .map(|e| match e.node_id() {
            Some(id) => format!("{}:{}", e.kind(), id),
            None => e.kind().to_string(),
        })
        .collect()
}

/// Ids of nodes that emitted `node_start`, in order.
pub fn started(events: &[ExecutionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::NodeStart { node_id, .. } => Some(node_id.clone()),
            _ => None,
        })
        .collect()
}

/// The execution log carried by a terminal `complete` event.
pub fn completed_log(events: &[ExecutionEvent]) -> Option<&[LogEntry]> {
    match events.last() {
        Some(ExecutionEvent::Complete { execution_log }) => Some(execution_log),
        _ => None,
    }
}
