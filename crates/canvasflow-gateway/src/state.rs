use canvasflow_engine::WorkflowExecutor;

/// Shared application state for axum handlers.
pub struct AppState {
    pub executor: WorkflowExecutor,
}
