use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use canvasflow_core::config::ImageConfig;
use canvasflow_core::error::{FlowError, Result};
use canvasflow_core::traits::NodeHandler;
use canvasflow_core::types::{value_to_text, HandlerOutput};

use super::parse_data;
use crate::template::substitute_inputs;

/// Calls an OpenAI-compatible image endpoint and returns
/// `{"url": ...}` or `{"b64_json": ...}`.
pub struct ImageGenerationHandler {
    http: reqwest::Client,
    config: ImageConfig,
}

impl ImageGenerationHandler {
    pub fn new(http: reqwest::Client, config: ImageConfig) -> Self {
        Self { http, config }
    }
}

#[derive(Deserialize)]
struct ImageParams {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

fn image_value(response: ImageResponse) -> Result<Value> {
    let first = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| FlowError::Http("image response contained no data".into()))?;
    match (first.url, first.b64_json) {
        (Some(url), _) => Ok(json!({ "url": url })),
        (None, Some(b64)) => Ok(json!({ "b64_json": b64 })),
        (None, None) => Err(FlowError::Http("image response had neither url nor b64_json".into())),
    }
}

impl NodeHandler for ImageGenerationHandler {
    fn node_type(&self) -> &str {
        "image_generation"
    }

    fn execute(
        &self,
        inputs: Vec<Value>,
        data: &Map<String, Value>,
    ) -> BoxFuture<'_, Result<HandlerOutput>> {
        let params = parse_data::<ImageParams>(data);
        Box::pin(async move {
            let params = params?;
            let prompt = match params.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
                Some(template) => substitute_inputs(template, &inputs),
                None => inputs
                    .first()
                    .map(value_to_text)
                    .ok_or_else(|| FlowError::invalid_config("prompt", "no prompt and no input"))?,
            };

            let body = ImageRequest {
                model: params.model.as_deref().unwrap_or(&self.config.model),
                prompt: &prompt,
                n: 1,
                size: params.size.as_deref().unwrap_or(&self.config.size),
            };
            info!(model = %body.model, size = %body.size, "Generating image");

            let mut req = self.http.post(&self.config.base_url).json(&body);
            if let Some(key) = &self.config.api_key {
                req = req.bearer_auth(key);
            }

            let response = req
                .send()
                .await
                .map_err(|e| FlowError::Http(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(FlowError::Http(format!("HTTP {}: {}", status, text)));
            }

            let parsed: ImageResponse = response
                .json()
                .await
                .map_err(|e| FlowError::Http(format!("invalid image response: {}", e)))?;
            Ok(HandlerOutput::value(image_value(parsed)?))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_preferred() {
        let response: ImageResponse = serde_json::from_value(json!({
            "created": 1,
            "data": [{ "url": "https://img/1.png", "revised_prompt": "a cat" }]
        }))
        .unwrap();
        assert_eq!(image_value(response).unwrap(), json!({ "url": "https://img/1.png" }));
    }

    #[test]
    fn test_b64_fallback() {
        let response: ImageResponse =
            serde_json::from_value(json!({ "data": [{ "b64_json": "aGk=" }] })).unwrap();
        assert_eq!(image_value(response).unwrap(), json!({ "b64_json": "aGk=" }));
    }

    #[test]
    fn test_empty_data_is_error() {
        let response: ImageResponse = serde_json::from_value(json!({ "data": [] })).unwrap();
        assert!(image_value(response).is_err());
    }
}
