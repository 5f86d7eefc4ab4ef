pub mod providers;
pub mod retry;
pub mod streaming;

use canvasflow_core::config::{ModelConfig, RetryConfig};
use canvasflow_core::traits::LlmClient;

pub use providers::anthropic::AnthropicClient;
pub use providers::openai::OpenAiClient;
pub use retry::RetryingClient;

/// Create an LLM client based on the provider name.
pub fn create_client(config: &ModelConfig) -> Box<dyn LlmClient> {
    match config.provider.as_str() {
        "anthropic" | "claude" => Box::new(AnthropicClient::new()),
        // Everything else uses the OpenAI-compatible client
        _ => Box::new(OpenAiClient::new()),
    }
}

/// Create the client used by text generation nodes: the primary provider
/// wrapped with retry and fallbacks whenever either is configured.
pub fn create_retrying_client(
    primary: &ModelConfig,
    fallbacks: &[ModelConfig],
) -> Box<dyn LlmClient> {
    if primary.retry.is_none() && fallbacks.is_empty() {
        return create_client(primary);
    }
    let fallback_clients = fallbacks
        .iter()
        .map(|fb| (fb.clone(), create_client(fb)))
        .collect();
    Box::new(RetryingClient::new(
        create_client(primary),
        fallback_clients,
        primary.retry.clone().unwrap_or_else(RetryConfig::default),
    ))
}
