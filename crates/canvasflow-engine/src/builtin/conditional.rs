use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use canvasflow_core::error::{FlowError, Result};
use canvasflow_core::traits::NodeHandler;
use canvasflow_core::types::HandlerOutput;

use super::parse_data;
use crate::condition::evaluate_condition;

pub const TRUE_PORT: &str = "true";
pub const FALSE_PORT: &str = "false";

/// Two-way branch. Evaluates `data.condition` against the inputs and
/// selects the `"true"` or `"false"` port.
///
/// The first input flows through unchanged so downstream nodes see the
/// value that was tested. With no inputs the decision itself is the value.
pub struct ConditionalHandler;

#[derive(Deserialize)]
struct ConditionalParams {
    #[serde(default)]
    condition: Option<String>,
}

impl NodeHandler for ConditionalHandler {
    fn node_type(&self) -> &str {
        "conditional"
    }

    fn ports(&self) -> &[&'static str] {
        &[TRUE_PORT, FALSE_PORT]
    }

    fn execute(
        &self,
        inputs: Vec<Value>,
        data: &Map<String, Value>,
    ) -> BoxFuture<'_, Result<HandlerOutput>> {
        let params = parse_data::<ConditionalParams>(data);
        Box::pin(async move {
            let condition = params?
                .condition
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| FlowError::invalid_config("condition", "missing expression"))?;

            let passed = evaluate_condition(&condition, &inputs)?;
            debug!(condition = %condition, passed, "Condition evaluated");

            let value = inputs
                .into_iter()
                .next()
                .unwrap_or(Value::Bool(passed));
            let port = if passed { TRUE_PORT } else { FALSE_PORT };
            Ok(HandlerOutput::branch(value, port))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cond(expr: &str) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("condition".into(), json!(expr));
        data
    }

    #[tokio::test]
    async fn test_selects_port_and_passes_input() {
        let out = ConditionalHandler
            .execute(vec![json!(12)], &cond("input > 10"))
            .await
            .unwrap();
        assert_eq!(out.branch.as_deref(), Some("true"));
        assert_eq!(out.value, json!(12));

        let out = ConditionalHandler
            .execute(vec![json!(3)], &cond("input > 10"))
            .await
            .unwrap();
        assert_eq!(out.branch.as_deref(), Some("false"));
    }

    #[tokio::test]
    async fn test_without_inputs_value_is_decision() {
        let out = ConditionalHandler
            .execute(vec![], &cond("false"))
            .await
            .unwrap();
        assert_eq!(out.value, json!(false));
        assert_eq!(out.branch.as_deref(), Some("false"));
    }

    #[tokio::test]
    async fn test_missing_or_broken_condition_fails() {
        assert!(ConditionalHandler
            .execute(vec![json!(1)], &Map::new())
            .await
            .is_err());
        assert!(ConditionalHandler
            .execute(vec![json!(1)], &cond("what is this"))
            .await
            .is_err());
    }

    #[test]
    fn test_declares_ports() {
        assert_eq!(ConditionalHandler.ports(), &["true", "false"]);
    }
}
