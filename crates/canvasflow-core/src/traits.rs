use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::*;

/// Node handler: the type-specific computation a node delegates to.
pub trait NodeHandler: Send + Sync + 'static {
    /// Type tag this handler serves (matches `Node::node_type`).
    fn node_type(&self) -> &str;

    /// Named output ports. Non-empty means the node is branching and its
    /// outgoing edges are filtered by `sourceHandle`.
    fn ports(&self) -> &[&'static str] {
        &[]
    }

    /// Run the node with its live inputs (in edge order) and its `data`.
    fn execute(
        &self,
        inputs: Vec<Value>,
        data: &Map<String, Value>,
    ) -> BoxFuture<'_, Result<HandlerOutput>>;
}

/// Sandboxed evaluator for caller-supplied code.
///
/// The script handler is the only component holding one; the scheduler has
/// no code-execution capability of its own.
pub trait ScriptEvaluator: Send + Sync + 'static {
    /// Language name reported in logs.
    fn language(&self) -> &str;

    /// Evaluate `code` with access to `inputs` only.
    fn evaluate(&self, code: &str, inputs: &[Value]) -> BoxFuture<'_, Result<Value>>;
}

/// LLM client with multi-provider streaming.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}
