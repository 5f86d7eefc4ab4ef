use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};

use canvasflow_core::config::{ImageConfig, ModelConfig};
use canvasflow_core::traits::NodeHandler;
use canvasflow_core::types::*;
use canvasflow_engine::builtin::http_request::HttpRequestHandler;
use canvasflow_engine::builtin::image_generation::ImageGenerationHandler;
use canvasflow_engine::builtin::script::ScriptHandler;
use canvasflow_engine::builtin::text_generation::TextGenerationHandler;
use canvasflow_engine::{BoaEvaluator, HandlerRegistry, WorkflowExecutor};
use canvasflow_test_utils::{completed_log, started, MockLlmClient};

/// Serve a small fixture API on an ephemeral port.
async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/echo", post(|Json(body): Json<Value>| async move { Json(json!({ "echo": body })) }))
        .route("/text", get(|| async { "plain body" }))
        .route(
            "/endless",
            get(|| async {
                // Chunked, no Content-Length, never finishes.
                Body::from_stream(futures::stream::repeat_with(|| {
                    Ok::<_, std::io::Error>("0123456789abcdef")
                }))
            }),
        )
        .route(
            "/fail",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
        )
        .route(
            "/images",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "data": [{ "url": format!("https://img.test/{}.png", body["prompt"].as_str().unwrap_or("")) }]
                }))
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn data(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn http_request_posts_json_and_parses_response() {
    let addr = spawn_server().await;
    let handler = HttpRequestHandler::new(reqwest::Client::new(), 1_000_000);

    let out = handler
        .execute(
            vec![json!("world")],
            &data(json!({
                "url": format!("http://{}/echo", addr),
                "method": "post",
                "headers": { "content-type": "application/json" },
                "body": "{\"hello\": \"$input1\"}"
            })),
        )
        .await
        .unwrap();
    assert_eq!(out.value, json!({ "echo": { "hello": "world" } }));
}

#[tokio::test]
async fn http_request_returns_text_bodies_as_strings() {
    let addr = spawn_server().await;
    let handler = HttpRequestHandler::new(reqwest::Client::new(), 1_000_000);
    let out = handler
        .execute(vec![], &data(json!({ "url": format!("http://{}/text", addr) })))
        .await
        .unwrap();
    assert_eq!(out.value, json!("plain body"));
}

#[tokio::test]
async fn http_request_non_success_status_fails() {
    let addr = spawn_server().await;
    let handler = HttpRequestHandler::new(reqwest::Client::new(), 1_000_000);
    let err = handler
        .execute(vec![], &data(json!({ "url": format!("http://{}/fail", addr) })))
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("500"));
    assert!(message.contains("upstream exploded"));
}

#[tokio::test]
async fn http_request_enforces_response_limit() {
    let addr = spawn_server().await;
    let handler = HttpRequestHandler::new(reqwest::Client::new(), 4);
    let err = handler
        .execute(vec![], &data(json!({ "url": format!("http://{}/text", addr) })))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("limit"));
}

#[tokio::test]
async fn http_request_stops_reading_unbounded_body_at_limit() {
    let addr = spawn_server().await;
    let handler = HttpRequestHandler::new(reqwest::Client::new(), 64 * 1024);
    let err = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        handler.execute(vec![], &data(json!({ "url": format!("http://{}/endless", addr) }))),
    )
    .await
    .expect("handler kept reading past the limit")
    .unwrap_err();
    assert!(err.to_string().contains("limit is 65536"));
}

#[tokio::test]
async fn image_generation_returns_url() {
    let addr = spawn_server().await;
    let handler = ImageGenerationHandler::new(
        reqwest::Client::new(),
        ImageConfig {
            base_url: format!("http://{}/images", addr),
            api_key: Some("test-key".into()),
            ..ImageConfig::default()
        },
    );
    let out = handler
        .execute(vec![json!("cat")], &Map::new())
        .await
        .unwrap();
    assert_eq!(out.value, json!({ "url": "https://img.test/cat.png" }));
}

#[tokio::test]
async fn text_generation_in_a_workflow() {
    let llm = MockLlmClient::replying("Paris is the capital of France.");
    let mut registry = HandlerRegistry::with_core();
    registry.register(TextGenerationHandler::new(
        Arc::new(llm.clone()),
        ModelConfig::default(),
    ));

    let graph = Graph::new(
        vec![
            Node::new("q", "prompt").with_data("content", json!("What is the capital of France?")),
            Node::new("llm", "text_generation")
                .with_data("prompt", json!("Answer briefly: $input1"))
                .with_data("systemPrompt", json!("You are terse."))
                .with_data("model", json!("small-model")),
            Node::new("out", "output"),
        ],
        vec![Edge::new("q", "llm"), Edge::new("llm", "out")],
    );

    let events = WorkflowExecutor::new(Arc::new(registry)).collect(graph).await;
    let log = completed_log(&events).unwrap();
    assert_eq!(log[2].output, json!("Paris is the capital of France."));

    let requests = llm.requests();
    assert_eq!(requests.len(), 1);
    let (config, messages) = &requests[0];
    assert_eq!(config.model_id, "small-model");
    assert_eq!(messages[0], ChatMessage::system("You are terse."));
    assert_eq!(
        messages[1],
        ChatMessage::user("Answer briefly: What is the capital of France?")
    );
}

#[tokio::test]
async fn llm_failure_becomes_node_error() {
    let mut registry = HandlerRegistry::with_core();
    registry.register(TextGenerationHandler::new(
        Arc::new(MockLlmClient::failing("HTTP 401: bad key")),
        ModelConfig::default(),
    ));
    let graph = Graph::new(
        vec![Node::new("s", "start"), Node::new("llm", "text_generation")],
        vec![Edge::new("s", "llm")],
    );

    let events = WorkflowExecutor::new(Arc::new(registry)).collect(graph).await;
    assert_eq!(started(&events), vec!["s", "llm"]);
    assert!(matches!(
        &events[events.len() - 2],
        ExecutionEvent::NodeError { error, .. } if error.contains("bad key")
    ));
    assert_eq!(events.last().map(|e| e.kind()), Some("error"));
}

#[tokio::test]
async fn script_node_transforms_input() {
    let mut registry = HandlerRegistry::with_core();
    registry.register(ScriptHandler::new(Some(Arc::new(BoaEvaluator::default()))));

    let graph = Graph::new(
        vec![
            Node::new("s", "start"),
            Node::new("js", "script")
                .with_data("code", json!("return { words: input.split(' ').length };")),
        ],
        vec![Edge::new("s", "js")],
    );

    let events = WorkflowExecutor::new(Arc::new(registry)).collect(graph).await;
    let log = completed_log(&events).unwrap();
    assert_eq!(log[1].output, json!({ "words": 2 }));
}

#[tokio::test]
async fn script_exception_is_node_error() {
    let mut registry = HandlerRegistry::with_core();
    registry.register(ScriptHandler::new(Some(Arc::new(BoaEvaluator::default()))));

    let graph = Graph::new(
        vec![Node::new("js", "script").with_data("code", json!("throw new Error('bad input');"))],
        vec![],
    );

    let events = WorkflowExecutor::new(Arc::new(registry)).collect(graph).await;
    assert!(matches!(
        &events[1],
        ExecutionEvent::NodeError { error, .. } if error.contains("bad input")
    ));
    assert_eq!(events.len(), 3);
}
