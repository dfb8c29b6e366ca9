use crate::view::{ViewCommand, ViewSink};
use flowscope_core::{Edge, NodeId, NodeInfo, NodeKind};
use smallvec::SmallVec;
use std::collections::HashMap;

/// The mirrored graph: exactly the node/edge set of the most recent snapshot
/// plus a per-topic value overlay. Mutated only by the reconciler and the
/// drain loop.
pub struct GraphModel {
    nodes: HashMap<NodeId, NodeKind>,
    edges: Vec<Edge>,
    values: HashMap<NodeId, String>,
    generation: u64,
    view: ViewSink,
}

impl GraphModel {
    pub fn new(view: ViewSink) -> Self {
        Self {
            nodes: HashMap::new(),
            edges: Vec::new(),
            values: HashMap::new(),
            generation: 0,
            view,
        }
    }

    /// Atomic full replace. The overlay does not survive a snapshot; the
    /// view rebuild is requested by the caller alongside the new element
    /// list, which carries the (blank) labels.
    pub fn replace_all(&mut self, nodes: Vec<NodeInfo>, edges: Vec<Edge>) {
        self.nodes = nodes.into_iter().map(|n| (n.id, n.kind)).collect();
        self.edges = edges;
        self.values.clear();
        self.generation += 1;
    }

    /// Overlay write. No-op unless the node exists and is a TOPIC.
    pub fn set_value(&mut self, id: &NodeId, value: impl Into<String>) -> bool {
        if self.nodes.get(id) != Some(&NodeKind::Topic) {
            return false;
        }
        let value = value.into();
        self.values.insert(id.clone(), value.clone());
        self.view.send(ViewCommand::SetNodeValue {
            id: id.clone(),
            value: Some(value),
        });
        true
    }

    pub fn clear_value(&mut self, id: &NodeId) {
        self.values.remove(id);
        if self.nodes.get(id) == Some(&NodeKind::Topic) {
            self.view.send(ViewCommand::SetNodeValue {
                id: id.clone(),
                value: None,
            });
        }
    }

    /// Drops every overlay value (config unload), one label reset per topic
    /// that actually held one.
    pub fn clear_values(&mut self) {
        let held: Vec<NodeId> = self.values.keys().cloned().collect();
        self.values.clear();
        for id in held {
            self.view.send(ViewCommand::SetNodeValue {
                id,
                value: None,
            });
        }
    }

    pub fn value(&self, id: &NodeId) -> Option<&str> {
        self.values.get(id).map(String::as_str)
    }

    pub fn kind(&self, id: &NodeId) -> Option<NodeKind> {
        self.nodes.get(id).copied()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Edges whose source is `id`; "flow from" direction only.
    pub fn outbound_edges(&self, id: &NodeId) -> SmallVec<[Edge; 4]> {
        self.edges
            .iter()
            .filter(|e| e.from == *id)
            .cloned()
            .collect()
    }
}
