//! The live workflow graph and every structural edit on it.
//!
//! `WorkflowGraph` is the single source of truth for nodes, edges, ports and containment.
//! Readers (property panel, scope resolver, minimap) either query it directly or register a
//! listener with [`WorkflowGraph::subscribe`]; every applied mutation bumps
//! [`WorkflowGraph::revision`] and is announced as a [`GraphEvent`].

use crate::document::{ConversationVariable, WorkflowMeta};
use crate::node::{NodeKind, Port, PortGroup};
use crate::settings::EditorSettings;
use ahash::AHashMap;
use serde_json::{Map, Value};
use std::fmt;

mod branch;
pub(crate) mod connection;
mod containment;
pub mod geometry;
mod mutation;

pub use branch::PortRemap;
pub use containment::{clamp_child_position, fit_container_size};
pub use geometry::*;

use crate::node::NodeForm;

/// A node as it lives on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub position: Position,
    pub size: Size,
    pub form: NodeForm,
    /// Id of the enclosing loop/iteration container.
    pub cycle: Option<String>,
    pub ports: Vec<Port>,
    /// Document fields the engine does not interpret, kept for saving.
    pub extra: Map<String, Value>,
}

impl GraphNode {
    pub fn rect(&self) -> Rect {
        Rect::new(self.position, self.size)
    }

    pub fn right_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.group == PortGroup::Right)
    }

    pub fn left_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.group == PortGroup::Left)
    }

    /// Position of `port_id` among the right-side ports.
    pub fn right_port_index(&self, port_id: &str) -> Option<usize> {
        self.right_ports().position(|p| p.id == port_id)
    }

    pub fn has_port(&self, port_id: &str, group: PortGroup) -> bool {
        self.ports.iter().any(|p| p.id == port_id && p.group == group)
    }
}

/// A directed connection from a right port of `source` to a left port of `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub source_port: String,
    pub target: String,
    pub target_port: String,
    pub extra: Map<String, Value>,
}

/// Change notifications, delivered after the change has been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    NodeAdded { id: String },
    NodeRemoved { id: String },
    NodeMoved { id: String, position: Position },
    NodeResized { id: String, size: Size },
    EdgeAdded { id: String },
    EdgeRemoved { id: String },
    PortsChanged { id: String },
    DataChanged { id: String },
    VariablesChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Listener = Box<dyn FnMut(&GraphEvent)>;

pub struct WorkflowGraph {
    nodes: AHashMap<String, GraphNode>,
    order: Vec<String>,
    edges: Vec<GraphEdge>,
    variables: Vec<ConversationVariable>,
    meta: WorkflowMeta,
    settings: EditorSettings,
    revision: u64,
    next_edge_seq: u64,
    next_subscription: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl fmt::Debug for WorkflowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowGraph")
            .field("nodes", &self.order.len())
            .field("edges", &self.edges.len())
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

impl WorkflowGraph {
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            nodes: AHashMap::new(),
            order: Vec::new(),
            edges: Vec::new(),
            variables: Vec::new(),
            meta: WorkflowMeta::default(),
            settings,
            revision: 0,
            next_edge_seq: 0,
            next_subscription: 0,
            listeners: Vec::new(),
        }
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Incremented on every applied change; derived views compare it to detect staleness.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Edges leaving `node_id`, in creation order.
    pub fn outgoing(&self, node_id: &str) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    pub fn incoming(&self, node_id: &str) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Direct children of a container.
    pub fn children(&self, container_id: &str) -> Vec<&GraphNode> {
        self.nodes()
            .filter(|n| n.cycle.as_deref() == Some(container_id))
            .collect()
    }

    pub fn variables(&self) -> &[ConversationVariable] {
        &self.variables
    }

    pub fn set_variables(&mut self, variables: Vec<ConversationVariable>) {
        self.variables = variables;
        self.emit(GraphEvent::VariablesChanged);
    }

    pub fn meta(&self) -> &WorkflowMeta {
        &self.meta
    }

    pub fn set_meta(&mut self, meta: WorkflowMeta) {
        self.meta = meta;
    }

    /// Registers a change listener.
    pub fn subscribe(&mut self, listener: impl FnMut(&GraphEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub(crate) fn emit(&mut self, event: GraphEvent) {
        self.revision += 1;
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn require(&self, id: &str) -> Result<&GraphNode, crate::error::GraphError> {
        self.nodes
            .get(id)
            .ok_or_else(|| crate::error::GraphError::NodeNotFound(id.to_string()))
    }

    /// Inserts a node without any containment or event side effects.
    pub(crate) fn insert_node(&mut self, node: GraphNode) {
        if !self.nodes.contains_key(&node.id) {
            self.order.push(node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node);
    }

    pub(crate) fn take_node(&mut self, id: &str) -> Option<GraphNode> {
        let node = self.nodes.remove(id)?;
        self.order.retain(|n| n != id);
        Some(node)
    }

    /// Appends an edge without validation.
    pub(crate) fn push_edge(&mut self, edge: GraphEdge) {
        self.edges.push(edge);
    }

    pub(crate) fn take_edges_where(
        &mut self,
        mut predicate: impl FnMut(&GraphEdge) -> bool,
    ) -> Vec<GraphEdge> {
        let (taken, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.edges).into_iter().partition(|e| predicate(e));
        self.edges = kept;
        taken
    }

    /// A fresh `<kind>_<n>` id not yet used in this graph.
    pub(crate) fn generate_node_id(&self, kind: &NodeKind) -> String {
        let prefix = kind.as_str().replace('-', "_");
        (1..)
            .map(|n| format!("{}_{}", prefix, n))
            .find(|candidate| !self.nodes.contains_key(candidate))
            .unwrap_or(prefix)
    }

    pub(crate) fn generate_edge_id(&mut self) -> String {
        loop {
            self.next_edge_seq += 1;
            let candidate = format!("edge_{}", self.next_edge_seq);
            if !self.edges.iter().any(|e| e.id == candidate) {
                return candidate;
            }
        }
    }
}
