use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use canvasflow_core::error::Result;
use canvasflow_core::traits::NodeHandler;
use canvasflow_core::types::HandlerOutput;

use super::parse_data;
use crate::template::substitute_inputs;

// ── StartHandler ────────────────────────────────────────────────

pub struct StartHandler;

#[derive(Deserialize)]
struct StartParams {
    #[serde(default)]
    message: Option<String>,
}

impl NodeHandler for StartHandler {
    fn node_type(&self) -> &str {
        "start"
    }
    fn execute(
        &self,
        _inputs: Vec<Value>,
        data: &Map<String, Value>,
    ) -> BoxFuture<'_, Result<HandlerOutput>> {
        let params = parse_data::<StartParams>(data);
        Box::pin(async move {
            let message = params?
                .message
                .unwrap_or_else(|| "Workflow started".to_string());
            Ok(HandlerOutput::value(message))
        })
    }
}

// ── PromptHandler ───────────────────────────────────────────────

/// Static text with `$inputN` placeholders filled from upstream values.
pub struct PromptHandler;

#[derive(Deserialize)]
struct PromptParams {
    #[serde(default)]
    content: String,
}

impl NodeHandler for PromptHandler {
    fn node_type(&self) -> &str {
        "prompt"
    }
    fn execute(
        &self,
        inputs: Vec<Value>,
        data: &Map<String, Value>,
    ) -> BoxFuture<'_, Result<HandlerOutput>> {
        let params = parse_data::<PromptParams>(data);
        Box::pin(async move {
            let params = params?;
            Ok(HandlerOutput::value(substitute_inputs(&params.content, &inputs)))
        })
    }
}

// ── OutputHandler ───────────────────────────────────────────────

/// Terminal sink. Passes a single input through, gathers several into an
/// array.
pub struct OutputHandler;

impl NodeHandler for OutputHandler {
    fn node_type(&self) -> &str {
        "output"
    }
    fn execute(
        &self,
        mut inputs: Vec<Value>,
        _data: &Map<String, Value>,
    ) -> BoxFuture<'_, Result<HandlerOutput>> {
        Box::pin(async move {
            let value = match inputs.len() {
                0 => Value::Null,
                1 => inputs.remove(0),
                _ => Value::Array(inputs),
            };
            Ok(HandlerOutput::value(value))
        })
    }
}

// ── NoopHandler ─────────────────────────────────────────────────

/// Fallback for unrecognized node types. Produces null, so everything
/// that depends only on it is skipped.
pub struct NoopHandler;

impl NodeHandler for NoopHandler {
    fn node_type(&self) -> &str {
        "noop"
    }
    fn execute(
        &self,
        inputs: Vec<Value>,
        _data: &Map<String, Value>,
    ) -> BoxFuture<'_, Result<HandlerOutput>> {
        Box::pin(async move {
            debug!(inputs = inputs.len(), "No-op handler");
            Ok(HandlerOutput::null())
        })
    }
}
