use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, info};

use canvasflow_core::event::to_ndjson_line;
use canvasflow_core::types::Graph;
use canvasflow_engine::GraphIndex;

use crate::state::AppState;

pub const NDJSON: &str = "application/x-ndjson";

// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "handlers": state.executor.registry().types(),
    }))
}

// POST /api/workflows/execute: streams one JSON event per line
pub async fn execute_workflow(
    State(state): State<Arc<AppState>>,
    Json(graph): Json<Graph>,
) -> Response {
    info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "Workflow execution requested"
    );

    let lines = state
        .executor
        .stream(graph)
        .map(|event| to_ndjson_line(&event));

    (
        [
            (header::CONTENT_TYPE, NDJSON),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(lines),
    )
        .into_response()
}

// POST /api/workflows/validate: index the graph without running it
pub async fn validate_workflow(
    State(state): State<Arc<AppState>>,
    Json(graph): Json<Graph>,
) -> Json<Value> {
    let registry = state.executor.registry();
    let mut unknown_types: Vec<String> = graph
        .nodes
        .iter()
        .filter(|n| !registry.contains(&n.node_type))
        .map(|n| n.node_type.clone())
        .collect();
    unknown_types.sort();
    unknown_types.dedup();

    match GraphIndex::build(graph) {
        Ok(index) => {
            debug!(entry_nodes = index.entry_nodes().len(), "Graph valid");
            Json(json!({
                "valid": true,
                "entryNodes": index.entry_nodes(),
                "unknownTypes": unknown_types,
            }))
        }
        Err(e) => Json(json!({
            "valid": false,
            "entryNodes": [],
            "unknownTypes": unknown_types,
            "error": e.to_string(),
        })),
    }
}
