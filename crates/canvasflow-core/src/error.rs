use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    // Graph errors
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Cycle detected at node: {node_id}")]
    CycleDetected { node_id: String },

    // Execution errors
    #[error("Node {node_id} failed: {message}")]
    NodeExecution { node_id: String, message: String },

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Invalid node config: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Condition error: {0}")]
    Condition(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Script execution is disabled")]
    ScriptDisabled,

    #[error("HTTP request failed: {0}")]
    Http(String),

    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    /// The event receiver went away; the run stops quietly.
    #[error("Execution cancelled")]
    Cancelled,

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    /// Shorthand for a missing or malformed field in a node's `data`.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for errors raised while validating the graph itself,
    /// before any node runs.
    pub fn is_graph_error(&self) -> bool {
        matches!(self, Self::NodeNotFound(_) | Self::DuplicateNode(_))
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
