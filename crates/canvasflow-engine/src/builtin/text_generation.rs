use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use canvasflow_core::config::ModelConfig;
use canvasflow_core::error::{FlowError, Result};
use canvasflow_core::traits::{LlmClient, NodeHandler};
use canvasflow_core::types::{value_to_text, ChatMessage, HandlerOutput, StreamDelta};

use super::parse_data;
use crate::template::substitute_inputs;

/// Sends a prompt to the configured model and returns the full completion
/// as a string.
pub struct TextGenerationHandler {
    client: Arc<dyn LlmClient>,
    defaults: ModelConfig,
}

impl TextGenerationHandler {
    pub fn new(client: Arc<dyn LlmClient>, defaults: ModelConfig) -> Self {
        Self { client, defaults }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextGenerationParams {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    max_tokens: Option<u32>,
}

impl TextGenerationParams {
    /// Prompt template if set, otherwise the upstream text.
    fn user_prompt(&self, inputs: &[Value]) -> Result<String> {
        match self.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(template) => Ok(substitute_inputs(template, inputs)),
            None => inputs
                .iter()
                .map(value_to_text)
                .reduce(|mut acc, next| {
                    acc.push_str("\n\n");
                    acc.push_str(&next);
                    acc
                })
                .ok_or_else(|| FlowError::invalid_config("prompt", "no prompt and no input")),
        }
    }

    fn model_config(&self, defaults: &ModelConfig) -> ModelConfig {
        let mut config = defaults.clone();
        if let Some(model) = &self.model {
            config.model_id = model.clone();
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = max_tokens;
        }
        config
    }
}

impl NodeHandler for TextGenerationHandler {
    fn node_type(&self) -> &str {
        "text_generation"
    }

    fn execute(
        &self,
        inputs: Vec<Value>,
        data: &Map<String, Value>,
    ) -> BoxFuture<'_, Result<HandlerOutput>> {
        let params = parse_data::<TextGenerationParams>(data);
        Box::pin(async move {
            let params = params?;
            let prompt = params.user_prompt(&inputs)?;
            let config = params.model_config(&self.defaults);

            let mut messages = Vec::with_capacity(2);
            if let Some(system) = params.system_prompt.as_deref().filter(|s| !s.is_empty()) {
                messages.push(ChatMessage::system(substitute_inputs(system, &inputs)));
            }
            messages.push(ChatMessage::user(prompt));

            info!(model = %config.model_id, provider = %config.provider, "Generating text");
            let started = Instant::now();

            let mut stream = self.client.chat_stream(&config, messages).await?;
            let mut text = String::new();
            while let Some(delta) = stream.next().await {
                match delta? {
                    StreamDelta::TextDelta(chunk) => text.push_str(&chunk),
                    StreamDelta::Usage {
                        input_tokens,
                        output_tokens,
                    } => debug!(input_tokens, output_tokens, "Token usage"),
                    StreamDelta::Stop(reason) => debug!(?reason, "Generation stopped"),
                }
            }

            debug!(
                chars = text.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Text generation complete"
            );
            Ok(HandlerOutput::value(text))
        })
    }
}
