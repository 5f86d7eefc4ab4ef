use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use canvasflow_core::error::{FlowError, Result};
use canvasflow_core::traits::{NodeHandler, ScriptEvaluator};
use canvasflow_core::types::HandlerOutput;

use super::parse_data;

/// Runs user code through the injected evaluator. Without one every
/// script node fails.
pub struct ScriptHandler {
    evaluator: Option<Arc<dyn ScriptEvaluator>>,
}

impl ScriptHandler {
    pub fn new(evaluator: Option<Arc<dyn ScriptEvaluator>>) -> Self {
        Self { evaluator }
    }

    pub fn disabled() -> Self {
        Self { evaluator: None }
    }
}

#[derive(Deserialize)]
struct ScriptParams {
    #[serde(default)]
    code: String,
}

impl NodeHandler for ScriptHandler {
    fn node_type(&self) -> &str {
        "script"
    }

    fn execute(
        &self,
        inputs: Vec<Value>,
        data: &Map<String, Value>,
    ) -> BoxFuture<'_, Result<HandlerOutput>> {
        let params = parse_data::<ScriptParams>(data);
        Box::pin(async move {
            let params = params?;
            let evaluator = self.evaluator.as_ref().ok_or(FlowError::ScriptDisabled)?;
            if params.code.trim().is_empty() {
                return Err(FlowError::invalid_config("code", "empty script"));
            }
            debug!(language = evaluator.language(), bytes = params.code.len(), "Running script");
            let value = evaluator.evaluate(&params.code, &inputs).await?;
            Ok(HandlerOutput::value(value))
        })
    }
}
