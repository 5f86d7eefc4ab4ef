use std::collections::HashSet;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use canvasflow_core::error::{FlowError, Result};
use canvasflow_core::types::{Edge, ExecutionEvent, Node};

use crate::context::{ExecutionContext, Resolution};
use crate::index::GraphIndex;
use crate::registry::HandlerRegistry;

/// Pull-based scheduler.
///
/// A node is resolved by first resolving every source of its incoming
/// edges, then running its handler on the live values. Results are
/// memoized, so each node runs at most once per run regardless of how many
/// paths reach it.
pub struct Scheduler<'a> {
    index: &'a GraphIndex,
    registry: &'a HandlerRegistry,
}

impl<'a> Scheduler<'a> {
    pub fn new(index: &'a GraphIndex, registry: &'a HandlerRegistry) -> Self {
        Self { index, registry }
    }

    /// Drive the whole graph: every entry node in input order, then every
    /// node reachable from it.
    ///
    /// Stops at the first failure. Terminal events are left to the caller.
    pub async fn run(&self, ctx: &mut ExecutionContext) -> Result<()> {
        for entry in self.index.entry_nodes() {
            self.resolve(ctx, entry).await?;
            for node_id in self.index.descendants(entry) {
                self.resolve(ctx, &node_id).await?;
            }
        }
        Ok(())
    }

    /// Resolve one node together with any upstream node that has not run
    /// yet.
    ///
    /// Upstream work is tracked on an explicit stack rather than by
    /// recursion, so the depth of a dependency chain costs heap, not call
    /// stack. Sources are visited in tie-break order, each finished before
    /// the next one starts.
    pub async fn resolve(&self, ctx: &mut ExecutionContext, node_id: &str) -> Result<Resolution> {
        if let Some(done) = ctx.result(node_id) {
            return Ok(done.clone());
        }

        // (node, sources already pushed)
        let mut stack: Vec<(&str, bool)> = vec![(node_id, false)];
        // Nodes whose sources are still pending; an edge back into this set
        // closes a loop.
        let mut on_path: HashSet<&str> = HashSet::new();

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                on_path.remove(id);
                self.resolve_ready(ctx, id).await?;
                continue;
            }
            if ctx.result(id).is_some() {
                continue;
            }

            on_path.insert(id);
            stack.push((id, true));
            for edge in self.index.incoming(id).iter().rev() {
                let source = edge.source.as_str();
                if ctx.result(source).is_some() {
                    continue;
                }
                if on_path.contains(source) {
                    warn!(node_id = source, "Node depends on itself");
                    return Err(FlowError::CycleDetected {
                        node_id: source.to_string(),
                    });
                }
                stack.push((source, false));
            }
        }

        ctx.result(node_id)
            .cloned()
            .ok_or_else(|| FlowError::Handler(format!("node {} was not resolved", node_id)))
    }

    /// Run `node_id` once every source of its incoming edges has a result.
    async fn resolve_ready(&self, ctx: &mut ExecutionContext, node_id: &str) -> Result<()> {
        let node = self.index.node(node_id)?;
        let incoming = self.index.incoming(node_id);

        let mut inputs = Vec::with_capacity(incoming.len());
        for edge in incoming {
            let upstream = ctx.result(&edge.source).ok_or_else(|| {
                FlowError::Handler(format!("source {} of {} was not resolved", edge.source, node_id))
            })?;
            if let Some(value) = self.live_value(edge, upstream)? {
                inputs.push(value);
            }
        }

        if !incoming.is_empty() && inputs.is_empty() {
            debug!(node_id, "No live input, skipping");
            ctx.record_skip(node_id);
            return Ok(());
        }

        self.dispatch(ctx, node, inputs).await
    }

    /// The value an edge delivers to its target, or `None` if the edge is
    /// dead: its source was skipped, produced null, or took another branch.
    fn live_value(&self, edge: &Edge, upstream: &Resolution) -> Result<Option<Value>> {
        let output = match upstream {
            Resolution::Completed(output) => output,
            Resolution::Skipped => return Ok(None),
        };

        if let Some(handle) = &edge.source_handle {
            let source = self.index.node(&edge.source)?;
            let branching = !self.registry.resolve(&source.node_type).ports().is_empty();
            if branching && output.branch.as_deref() != Some(handle.as_str()) {
                debug!(
                    edge = %edge.key(),
                    handle = %handle,
                    branch = ?output.branch,
                    "Edge not taken"
                );
                return Ok(None);
            }
        }

        if output.value.is_null() {
            return Ok(None);
        }
        Ok(Some(output.value.clone()))
    }

    async fn dispatch(
        &self,
        ctx: &mut ExecutionContext,
        node: &Node,
        inputs: Vec<Value>,
    ) -> Result<()> {
        let handler = self.registry.resolve(&node.node_type);

        ctx.emit(ExecutionEvent::NodeStart {
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
        })
        .await?;

        info!(
            node_id = %node.id,
            node_type = %node.node_type,
            inputs = inputs.len(),
            "Executing node"
        );
        let started = Instant::now();

        match handler.execute(inputs, &node.data).await {
            Ok(output) => {
                debug!(
                    node_id = %node.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    branch = ?output.branch,
                    "Node complete"
                );
                let event = ExecutionEvent::NodeComplete {
                    node_id: node.id.clone(),
                    node_type: node.node_type.clone(),
                    output: output.value.clone(),
                    branch: output.branch.clone(),
                };
                ctx.record_success(node, output);
                ctx.emit(event).await
            }
            Err(e) => {
                let message = e.to_string();
                error!(
                    node_id = %node.id,
                    node_type = %node.node_type,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %message,
                    "Node failed"
                );
                ctx.record_failure(node, &message);
                ctx.emit(ExecutionEvent::NodeError {
                    node_id: node.id.clone(),
                    node_type: node.node_type.clone(),
                    error: message.clone(),
                })
                .await?;
                Err(FlowError::NodeExecution {
                    node_id: node.id.clone(),
                    message,
                })
            }
        }
    }
}
