use std::sync::Arc;
use std::time::Instant;

use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

use canvasflow_core::error::{FlowError, Result};
use canvasflow_core::event::EventEmitter;
use canvasflow_core::types::{ExecutionEvent, Graph, LogEntry};

use crate::context::ExecutionContext;
use crate::index::GraphIndex;
use crate::registry::HandlerRegistry;
use crate::scheduler::Scheduler;

const DEFAULT_EVENT_BUFFER: usize = 64;

/// Runs workflow graphs against a shared handler registry.
///
/// Cheap to clone. Every run gets its own index, result table and log, so
/// concurrent runs never observe each other.
#[derive(Clone)]
pub struct WorkflowExecutor {
    registry: Arc<HandlerRegistry>,
    event_buffer: usize,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Capacity of the per-run event channel used by [`stream`](Self::stream).
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Execute `graph`, sending every event to `emitter`.
    ///
    /// The last event is always `complete` (on success) or `error`, unless
    /// the receiver hung up, in which case the run stops quietly with
    /// `Cancelled`. The returned log matches the one in `complete`.
    pub async fn execute(&self, graph: Graph, emitter: EventEmitter) -> Result<Vec<LogEntry>> {
        let started = Instant::now();
        let index = match GraphIndex::build(graph) {
            Ok(index) => index,
            Err(e) => {
                error!(error = %e, "Invalid graph");
                // The rejection itself is what the caller needs to see.
                let _ = emitter
                    .emit(ExecutionEvent::Error {
                        error: e.to_string(),
                    })
                    .await;
                return Err(e);
            }
        };

        info!(
            nodes = index.len(),
            entry_nodes = index.entry_nodes().len(),
            "Starting workflow run"
        );

        let mut ctx = ExecutionContext::new(emitter);
        let outcome = Scheduler::new(&index, &self.registry).run(&mut ctx).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                let log = ctx.log().to_vec();
                info!(executed = log.len(), elapsed_ms, "Workflow complete");
                ctx.emit(ExecutionEvent::Complete {
                    execution_log: log.clone(),
                })
                .await?;
                Ok(log)
            }
            Err(FlowError::Cancelled) => {
                debug!(elapsed_ms, "Event receiver dropped, run cancelled");
                Err(FlowError::Cancelled)
            }
            Err(e) => {
                error!(error = %e, elapsed_ms, "Workflow failed");
                let _ = ctx
                    .emit(ExecutionEvent::Error {
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Spawn a run and return its event stream.
    ///
    /// Dropping the stream cancels the run after the in-flight handler
    /// returns.
    pub fn stream(&self, graph: Graph) -> ReceiverStream<ExecutionEvent> {
        let (emitter, rx) = EventEmitter::channel(self.event_buffer);
        let executor = self.clone();
        tokio::spawn(async move {
            let _ = executor.execute(graph, emitter).await;
        });
        ReceiverStream::new(rx)
    }

    /// Run to completion and return every event in emission order.
    pub async fn collect(&self, graph: Graph) -> Vec<ExecutionEvent> {
        let (emitter, mut rx) = EventEmitter::channel(self.event_buffer);
        let executor = self.clone();
        let run = tokio::spawn(async move { executor.execute(graph, emitter).await });

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        let _ = run.await;
        events
    }
}
