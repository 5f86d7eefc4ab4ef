use std::collections::HashMap;

use futures::future::BoxFuture;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use canvasflow_core::error::{FlowError, Result};
use canvasflow_core::traits::NodeHandler;
use canvasflow_core::types::HandlerOutput;

use super::parse_data;
use crate::template::substitute_inputs;

/// Makes an outbound HTTP call. The response body is the node's output:
/// parsed when it is JSON, a string otherwise.
pub struct HttpRequestHandler {
    http: reqwest::Client,
    max_response_bytes: usize,
}

impl HttpRequestHandler {
    pub fn new(http: reqwest::Client, max_response_bytes: usize) -> Self {
        Self {
            http,
            max_response_bytes,
        }
    }
}

#[derive(Deserialize)]
struct HttpRequestParams {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: Option<Value>,
}

fn default_method() -> String {
    "GET".into()
}

fn decode_body(bytes: &[u8], is_json: bool) -> Value {
    if is_json {
        if let Ok(value) = serde_json::from_slice(bytes) {
            return value;
        }
    }
    Value::String(String::from_utf8_lossy(bytes).into_owned())
}

fn too_large(size: usize, limit: usize) -> FlowError {
    FlowError::Http(format!("response is {} bytes, limit is {}", size, limit))
}

/// Read the body, giving up as soon as it grows past `limit` bytes.
async fn read_limited(response: reqwest::Response, limit: usize) -> Result<Vec<u8>> {
    if let Some(declared) = response.content_length() {
        if declared > limit as u64 {
            return Err(too_large(declared as usize, limit));
        }
    }

    let mut body = Vec::new();
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| FlowError::Http(e.to_string()))?;
        if body.len() + chunk.len() > limit {
            return Err(too_large(body.len() + chunk.len(), limit));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

impl NodeHandler for HttpRequestHandler {
    fn node_type(&self) -> &str {
        "http_request"
    }

    fn execute(
        &self,
        inputs: Vec<Value>,
        data: &Map<String, Value>,
    ) -> BoxFuture<'_, Result<HandlerOutput>> {
        let params = parse_data::<HttpRequestParams>(data);
        Box::pin(async move {
            let params = params?;
            let url = substitute_inputs(&params.url, &inputs);
            let method = params
                .method
                .to_uppercase()
                .parse::<reqwest::Method>()
                .map_err(|e| FlowError::invalid_config("method", e.to_string()))?;

            info!(method = %method, url = %url, "HTTP request");
            let mut req = self.http.request(method, &url);
            for (k, v) in &params.headers {
                req = req.header(k.as_str(), substitute_inputs(v, &inputs));
            }
            req = match params.body {
                None | Some(Value::Null) => req,
                Some(Value::String(text)) => req.body(substitute_inputs(&text, &inputs)),
                Some(structured) => req.json(&structured),
            };

            let response = req
                .send()
                .await
                .map_err(|e| FlowError::Http(e.to_string()))?;
            let status = response.status();
            let is_json = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.contains("json"));

            let bytes = read_limited(response, self.max_response_bytes).await?;
            debug!(status = status.as_u16(), bytes = bytes.len(), "HTTP response");

            if !status.is_success() {
                let text = String::from_utf8_lossy(&bytes);
                let snippet: String = text.chars().take(500).collect();
                return Err(FlowError::Http(format!(
                    "HTTP {} {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or(""),
                    snippet
                )));
            }

            Ok(HandlerOutput::value(decode_body(&bytes, is_json)))
        })
    }
}
