//! Graph wrapper using petgraph::StableDiGraph keyed by node id strings

use crate::model::{GraphEdge, GraphNode};
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// One partition's dependency graph. Nodes are unique by id and every edge
/// connects two nodes already present in the graph.
pub struct DependencyGraph {
    inner: StableDiGraph<GraphNode, GraphEdge>,
    index: HashMap<String, NodeIndex>,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Add a node. A node whose id is already present is not added twice.
    pub fn add_node(&mut self, node: GraphNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node.id) {
            return idx;
        }
        let id = node.id.clone();
        let idx = self.inner.add_node(node);
        self.index.insert(id, idx);
        idx
    }

    /// Add an edge. Returns `None` when an endpoint is missing, the edge is a
    /// self-loop, or an identical edge already exists.
    pub fn add_edge(&mut self, edge: GraphEdge) -> Option<EdgeIndex> {
        if edge.from == edge.to {
            return None;
        }
        let source = *self.index.get(&edge.from)?;
        let target = *self.index.get(&edge.to)?;
        let duplicate = self
            .inner
            .edges_directed(source, Direction::Outgoing)
            .any(|e| e.target() == target && e.weight().label == edge.label);
        if duplicate {
            return None;
        }
        Some(self.inner.add_edge(source, target, edge))
    }

    /// Get a node by id.
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index
            .get(id)
            .and_then(|&idx| self.inner.node_weight(idx))
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// All nodes, ordered by id.
    pub fn nodes(&self) -> Vec<GraphNode> {
        let mut nodes: Vec<GraphNode> = self.inner.node_weights().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// All edges, ordered by (from, to, label).
    pub fn edges(&self) -> Vec<GraphEdge> {
        let mut edges: Vec<GraphEdge> = self.inner.edge_weights().cloned().collect();
        edges.sort();
        edges
    }

    /// Get all outgoing edges from a node.
    pub fn edges_from(&self, id: &str) -> Vec<&GraphEdge> {
        self.directed(id, Direction::Outgoing)
    }

    /// Get all incoming edges to a node.
    pub fn edges_to(&self, id: &str) -> Vec<&GraphEdge> {
        self.directed(id, Direction::Incoming)
    }

    fn directed(&self, id: &str, direction: Direction) -> Vec<&GraphEdge> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        self.inner
            .edges_directed(idx, direction)
            .map(|edge_ref| edge_ref.weight())
            .collect()
    }

    /// Render as Mermaid flowchart text. Output order follows `nodes()` and `edges()`.
    pub fn to_mermaid(&self) -> String {
        let mut lines = vec!["graph TD".to_string()];
        for node in self.nodes() {
            lines.push(format!(
                "    {}[\"{}\"]",
                mermaid_id(&node.id),
                node.label.replace('"', "#quot;")
            ));
        }
        for edge in self.edges() {
            let from = mermaid_id(&edge.from);
            let to = mermaid_id(&edge.to);
            if edge.label.is_empty() {
                lines.push(format!("    {from} --> {to}"));
            } else {
                lines.push(format!(
                    "    {from} -->|{}| {to}",
                    edge.label.replace('|', "#124;")
                ));
            }
        }
        lines.join("\n")
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier-safe token for a node id. ASCII alphanumerics are kept, `_`
/// is doubled and every other byte becomes `_xHH`, so distinct ids always
/// get distinct tokens.
pub fn mermaid_id(id: &str) -> String {
    let mut token = String::with_capacity(id.len());
    for byte in id.bytes() {
        match byte {
            b'_' => token.push_str("__"),
            b if b.is_ascii_alphanumeric() => token.push(char::from(b)),
            b => token.push_str(&format!("_x{b:02X}")),
        }
    }
    token
}
