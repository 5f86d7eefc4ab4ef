use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use canvasflow_core::config::GatewayConfig;
use canvasflow_engine::WorkflowExecutor;

use crate::routes;
use crate::state::AppState;

/// HTTP gateway exposing the workflow engine, built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    executor: WorkflowExecutor,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, executor: WorkflowExecutor) -> Self {
        Self { config, executor }
    }

    /// The application router, without a listener attached.
    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            executor: self.executor.clone(),
        });

        Router::new()
            .route("/api/health", get(routes::health))
            .route("/api/workflows/execute", post(routes::execute_workflow))
            .route("/api/workflows/validate", post(routes::validate_workflow))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let app = self.router();

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}
