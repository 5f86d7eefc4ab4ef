use std::io::Write;
use std::path::Path;

use canvasflow_core::config::AppConfig;
use canvasflow_core::FlowError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[engine]
event_buffer = 16

[engine.script]
enabled = false
timeout_secs = 2

[model]
provider = "anthropic"
model_id = "claude-test"
api_key = "sk-test-key"
max_tokens = 4096
temperature = 0.5

[model.retry]
max_retries = 5

[[fallback_models]]
provider = "openai"
model_id = "gpt-4o-mini"

[image]
base_url = "http://localhost:9000/v1/images/generations"
size = "512x512"

[http]
timeout_secs = 10
max_response_bytes = 2048

[gateway]
bind = "0.0.0.0:9999"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.event_buffer, 16);
    assert!(!config.engine.script.enabled);
    assert_eq!(config.engine.script.timeout_secs, 2);
    assert_eq!(config.model.provider, "anthropic");
    assert_eq!(config.model.model_id, "claude-test");
    assert_eq!(config.model.api_key, Some("sk-test-key".to_string()));
    assert_eq!(config.model.max_tokens, 4096);
    assert_eq!(config.model.retry.as_ref().map(|r| r.max_retries), Some(5));
    assert_eq!(config.fallback_models.len(), 1);
    assert_eq!(config.image.size, "512x512");
    assert_eq!(config.image.model, "dall-e-3");
    assert_eq!(config.http.max_response_bytes, 2048);
    assert_eq!(config.gateway.bind, "0.0.0.0:9999");
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("CANVASFLOW_TEST_API_KEY", "expanded-key-value");

    let toml_content = r#"
[model]
model_id = "test-model"
api_key = "${CANVASFLOW_TEST_API_KEY}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.model.api_key, Some("expanded-key-value".to_string()));

    std::env::remove_var("CANVASFLOW_TEST_API_KEY");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let toml_content = r#"
[model]
model_id = "llama3.2"
base_url = "http://localhost:11434/v1/chat/completions"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, "openai");
    assert!(config.model.retry.is_none());
    assert!(config.fallback_models.is_empty());
    assert!(config.engine.script.enabled);
    assert_eq!(config.engine.script.timeout_secs, 5);
    assert_eq!(config.http.timeout_secs, 30);
    assert_eq!(config.gateway.bind, "127.0.0.1:8787");
}

#[test]
fn test_missing_file() {
    let missing = Path::new("/definitely/not/here/canvasflow.toml");
    let err = AppConfig::load(missing).unwrap_err();
    assert!(matches!(err, FlowError::ConfigNotFound(_)));

    let config = AppConfig::load_or_default(missing).expect("defaults");
    assert_eq!(config.engine.event_buffer, 64);
}
