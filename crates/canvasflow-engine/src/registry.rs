use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use canvasflow_core::config::AppConfig;
use canvasflow_core::error::{FlowError, Result};
use canvasflow_core::traits::{LlmClient, NodeHandler, ScriptEvaluator};

use crate::builtin;
use crate::sandbox::BoaEvaluator;

/// Registry of node handlers keyed by node type.
///
/// Lookups never fail: unknown types resolve to a no-op handler so that a
/// graph containing a node the server does not know still runs.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
    fallback: Arc<dyn NodeHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(builtin::basic::NoopHandler),
        }
    }

    /// Register a handler, replacing any previous one for the same type.
    pub fn register(&mut self, handler: impl NodeHandler) {
        self.register_arc(Arc::new(handler));
    }

    pub fn register_arc(&mut self, handler: Arc<dyn NodeHandler>) {
        let node_type = handler.node_type().to_string();
        if self.handlers.insert(node_type.clone(), handler).is_some() {
            debug!(node_type = %node_type, "Replaced node handler");
        }
    }

    /// Unregister a handler by type.
    pub fn unregister(&mut self, node_type: &str) -> bool {
        self.handlers.remove(node_type).is_some()
    }

    /// Get a handler by type, if one is registered.
    pub fn get(&self, node_type: &str) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.get(node_type).cloned()
    }

    /// Get a handler by type, falling back to the no-op handler.
    pub fn resolve(&self, node_type: &str) -> Arc<dyn NodeHandler> {
        match self.handlers.get(node_type) {
            Some(handler) => handler.clone(),
            None => {
                warn!(node_type, "Unknown node type, using no-op handler");
                self.fallback.clone()
            }
        }
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.handlers.contains_key(node_type)
    }

    /// Registered types, sorted.
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    /// Handlers that need no external service: start, prompt, conditional
    /// and output.
    pub fn with_core() -> Self {
        let mut registry = Self::new();
        registry.register(builtin::basic::StartHandler);
        registry.register(builtin::basic::PromptHandler);
        registry.register(builtin::conditional::ConditionalHandler);
        registry.register(builtin::basic::OutputHandler);
        registry
    }

    /// Every built-in handler, wired to the services described by `config`.
    pub fn with_builtins(config: &AppConfig) -> Result<Self> {
        let llm: Arc<dyn LlmClient> = Arc::from(canvasflow_llm::create_retrying_client(
            &config.model,
            &config.fallback_models,
        ));
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .user_agent(config.http.user_agent.clone())
            .build()
            .map_err(|e| FlowError::Config(format!("HTTP client: {}", e)))?;
        let evaluator: Option<Arc<dyn ScriptEvaluator>> = if config.engine.script.enabled {
            Some(Arc::new(BoaEvaluator::new(config.engine.script.clone())))
        } else {
            None
        };

        let mut registry = Self::with_core();
        registry.register(builtin::text_generation::TextGenerationHandler::new(
            llm,
            config.model.clone(),
        ));
        registry.register(builtin::image_generation::ImageGenerationHandler::new(
            http.clone(),
            config.image.clone(),
        ));
        registry.register(builtin::http_request::HttpRequestHandler::new(
            http,
            config.http.max_response_bytes,
        ));
        registry.register(builtin::script::ScriptHandler::new(evaluator));
        Ok(registry)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
