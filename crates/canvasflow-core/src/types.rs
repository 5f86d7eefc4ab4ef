use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canvas coordinates of a node. The engine only uses them to order
/// incoming edges deterministically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// A unit of work in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within the graph.
    pub id: String,
    /// Handler discriminator (`"prompt"`, `"conditional"`, ...).
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    /// Handler-specific configuration.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            position: Position::default(),
            data: Map::new(),
        }
    }

    /// Set a single `data` field.
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Set the canvas position.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }
}

/// A directed dependency between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    /// Output port of a branching source (`"true"` / `"false"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
}

impl Edge {
    /// Create an unconditional edge.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{}-{}", source, target),
            source,
            target,
            source_handle: None,
        }
    }

    /// Create an edge leaving a named output port.
    pub fn from_port(
        source: impl Into<String>,
        handle: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let mut edge = Self::new(source, target);
        edge.source_handle = Some(handle.into());
        edge
    }

    /// Stable key for ordering; falls back to `source-target` when the
    /// canvas did not assign an id.
    pub fn key(&self) -> String {
        if self.id.is_empty() {
            format!("{}-{}", self.source, self.target)
        } else {
            self.id.clone()
        }
    }
}

/// The request body: a raw node/edge list as drawn on the canvas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }
}

/// What a handler hands back to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutput {
    pub value: Value,
    /// Selected output port for branching handlers.
    pub branch: Option<String>,
}

impl HandlerOutput {
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            branch: None,
        }
    }

    pub fn null() -> Self {
        Self::value(Value::Null)
    }

    pub fn branch(value: Value, port: impl Into<String>) -> Self {
        Self {
            value,
            branch: Some(port.into()),
        }
    }
}

/// One record per node that actually ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub node_id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl LogEntry {
    pub fn success(node: &Node, output: &HandlerOutput) -> Self {
        Self {
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            output: output.value.clone(),
            error: None,
            branch: output.branch.clone(),
        }
    }

    pub fn failure(node: &Node, error: impl Into<String>) -> Self {
        Self {
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            output: Value::Null,
            error: Some(error.into()),
            branch: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Progress event streamed to the caller, one per state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    NodeStart {
        #[serde(rename = "nodeId")]
        node_id: String,
        #[serde(rename = "nodeType")]
        node_type: String,
    },
    NodeComplete {
        #[serde(rename = "nodeId")]
        node_id: String,
        #[serde(rename = "nodeType")]
        node_type: String,
        output: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
    },
    NodeError {
        #[serde(rename = "nodeId")]
        node_id: String,
        #[serde(rename = "nodeType")]
        node_type: String,
        error: String,
    },
    Complete {
        #[serde(rename = "executionLog")]
        execution_log: Vec<LogEntry>,
    },
    Error {
        error: String,
    },
}

impl ExecutionEvent {
    /// `complete` and `error` end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// Node id for node-scoped events.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeStart { node_id, .. }
            | Self::NodeComplete { node_id, .. }
            | Self::NodeError { node_id, .. } => Some(node_id),
            _ => None,
        }
    }

    /// Short tag, e.g. `"node_start"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NodeStart { .. } => "node_start",
            Self::NodeComplete { .. } => "node_complete",
            Self::NodeError { .. } => "node_error",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }
}

/// Role in a model conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message sent to a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }
}

/// Stop reason from the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
}

/// A streaming delta from the model.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamDelta {
    TextDelta(String),
    Stop(StopReason),
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
}

/// Render a value the way placeholders and prompts see it: strings
/// verbatim, everything else as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
