pub mod basic;
pub mod conditional;
pub mod http_request;
pub mod image_generation;
pub mod script;
pub mod text_generation;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use canvasflow_core::error::{FlowError, Result};

/// Deserialize a node's `data` into a handler's parameter struct.
pub(crate) fn parse_data<T: DeserializeOwned>(data: &Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(data.clone()))
        .map_err(|e| FlowError::invalid_config("data", e.to_string()))
}
