//! Workflow graph execution.
//!
//! A [`WorkflowExecutor`] takes a node/edge [`Graph`](canvasflow_core::Graph),
//! indexes it, and resolves every node reachable from the entry nodes on
//! demand: upstream first, each node at most once. Branch nodes prune the
//! edges they did not take and nodes left without live input are skipped.
//! Progress is reported as a stream of
//! [`ExecutionEvent`](canvasflow_core::ExecutionEvent)s.

pub mod builtin;
pub mod condition;
pub mod context;
pub mod executor;
pub mod index;
pub mod registry;
pub mod sandbox;
pub mod scheduler;
pub mod template;

pub use context::{ExecutionContext, Resolution};
pub use executor::WorkflowExecutor;
pub use index::GraphIndex;
pub use registry::HandlerRegistry;
pub use sandbox::BoaEvaluator;
pub use scheduler::Scheduler;
