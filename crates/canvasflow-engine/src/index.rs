use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use canvasflow_core::error::{FlowError, Result};
use canvasflow_core::types::{Edge, Graph, Node};

/// Random-access view of a graph, built once per run.
///
/// Incoming edges are pre-sorted by the deterministic tie-break (source
/// position, then source id, then edge key) so every run of the same graph
/// collects inputs in the same order.
#[derive(Debug)]
pub struct GraphIndex {
    nodes: HashMap<String, Node>,
    incoming: HashMap<String, Vec<Edge>>,
    outgoing: HashMap<String, Vec<Edge>>,
    entry_nodes: Vec<String>,
}

impl GraphIndex {
    /// Build the index. Fails on duplicate node ids and on edges whose
    /// endpoints do not exist.
    pub fn build(graph: Graph) -> Result<Self> {
        let mut nodes = HashMap::with_capacity(graph.nodes.len());
        let mut order = Vec::with_capacity(graph.nodes.len());
        for node in graph.nodes {
            if nodes.contains_key(&node.id) {
                return Err(FlowError::DuplicateNode(node.id));
            }
            order.push(node.id.clone());
            nodes.insert(node.id.clone(), node);
        }

        let mut incoming: HashMap<String, Vec<Edge>> = HashMap::new();
        let mut outgoing: HashMap<String, Vec<Edge>> = HashMap::new();
        for edge in graph.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !nodes.contains_key(endpoint) {
                    return Err(FlowError::NodeNotFound(endpoint.clone()));
                }
            }
            outgoing
                .entry(edge.source.clone())
                .or_default()
                .push(edge.clone());
            incoming.entry(edge.target.clone()).or_default().push(edge);
        }

        for edges in incoming.values_mut() {
            edges.sort_by(|a, b| tie_break(&nodes, a, b));
        }

        let entry_nodes = order
            .into_iter()
            .filter(|id| !incoming.contains_key(id))
            .collect();

        Ok(Self {
            nodes,
            incoming,
            outgoing,
            entry_nodes,
        })
    }

    pub fn node(&self, id: &str) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| FlowError::NodeNotFound(id.to_string()))
    }

    /// Edges targeting `id`, in tie-break order.
    pub fn incoming(&self, id: &str) -> &[Edge] {
        self.incoming.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Edges leaving `id`, in input order.
    pub fn outgoing(&self, id: &str) -> &[Edge] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes with no incoming edge, in input order.
    pub fn entry_nodes(&self) -> &[String] {
        &self.entry_nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node reachable from `start` (excluding `start`), depth first,
    /// following outgoing edges in input order.
    pub fn descendants(&self, start: &str) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(start);
        let mut out = Vec::new();
        let mut stack: Vec<&str> = self
            .outgoing(start)
            .iter()
            .rev()
            .map(|e| e.target.as_str())
            .collect();

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id.to_string());
            stack.extend(self.outgoing(id).iter().rev().map(|e| e.target.as_str()));
        }
        out
    }
}

fn tie_break(nodes: &HashMap<String, Node>, a: &Edge, b: &Edge) -> Ordering {
    let pa = nodes.get(&a.source).map(|n| n.position).unwrap_or_default();
    let pb = nodes.get(&b.source).map(|n| n.position).unwrap_or_default();
    pa.x.total_cmp(&pb.x)
        .then_with(|| pa.y.total_cmp(&pb.y))
        .then_with(|| a.source.cmp(&b.source))
        .then_with(|| a.key().cmp(&b.key()))
}
