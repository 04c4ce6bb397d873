use super::outputs::{
    CONVERSATION_NAMESPACE, OutputField, SYSTEM_NAMESPACE, container_outputs, node_outputs,
};
use super::types::{NodeRef, Variable, VariableType};
use crate::error::GraphError;
use crate::graph::{GraphNode, WorkflowGraph};
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use std::cell::RefCell;
use std::collections::VecDeque;

/// Computes which variables a node may reference.
///
/// Built once per graph revision: the reverse adjacency is indexed up front, then every
/// query is a breadth-first walk over it.
pub struct ScopeResolver<'g> {
    graph: &'g WorkflowGraph,
    upstream: AHashMap<&'g str, Vec<&'g str>>,
    /// References currently being typed, to stop aggregator chains that loop.
    typing: RefCell<AHashSet<String>>,
}

impl<'g> ScopeResolver<'g> {
    pub fn new(graph: &'g WorkflowGraph) -> Self {
        let mut upstream: AHashMap<&str, Vec<&str>> = AHashMap::new();
        for edge in graph.edges() {
            upstream
                .entry(edge.target.as_str())
                .or_default()
                .push(edge.source.as_str());
        }
        Self {
            graph,
            upstream,
            typing: RefCell::new(AHashSet::new()),
        }
    }

    /// Every transitive upstream node of `node_id`, nearest first. Never contains `node_id`.
    pub fn ancestors(&self, node_id: &str) -> Vec<&'g str> {
        let mut visited: AHashSet<&str> = AHashSet::new();
        visited.insert(node_id);
        let mut queue: VecDeque<&str> = VecDeque::from([node_id]);
        let mut order = Vec::new();

        while let Some(current) = queue.pop_front() {
            for &source in self.upstream.get(current).into_iter().flatten() {
                if visited.insert(source) {
                    order.push(source);
                    queue.push_back(source);
                }
            }
        }
        order
    }

    /// The ordered, deduplicated variable list for `node_id`.
    ///
    /// Container-injected variables come first, then upstream outputs nearest first (the
    /// node's siblings, then whatever feeds its container), then conversation variables.
    ///
    /// A container child sees only the sibling children upstream of it. Siblings on an
    /// unconnected or downstream path are excluded.
    pub fn resolve(&self, node_id: &str) -> Result<Vec<Variable>, GraphError> {
        let node = self.graph.require(node_id)?;
        let container = node.cycle.as_deref().and_then(|id| self.graph.node(id));

        let mut variables = Vec::new();
        if let Some(container) = container {
            let fields = container_outputs(container, &mut |r| self.reference_type(r));
            variables.extend(self.to_variables(container, fields));
        }
        for ancestor in self.ancestors(node_id) {
            variables.extend(self.outputs_of(ancestor));
        }
        if let Some(container) = container {
            for ancestor in self.ancestors(&container.id) {
                variables.extend(self.outputs_of(ancestor));
            }
        }
        variables.extend(self.conversation_variables());

        Ok(variables
            .into_iter()
            .unique_by(|v| v.value.clone())
            .collect())
    }

    /// What `node_id` publishes downstream, as picker entries.
    pub fn outputs_of(&self, node_id: &str) -> Vec<Variable> {
        let Some(node) = self.graph.node(node_id) else {
            return Vec::new();
        };
        let fields = node_outputs(node, &mut |r| self.reference_type(r));
        self.to_variables(node, fields)
    }

    /// The type behind a dotted reference such as `llm_1.output` or `conv.topic`.
    pub fn reference_type(&self, reference: &str) -> VariableType {
        let Some((namespace, field)) = reference.split_once('.') else {
            return VariableType::Any;
        };
        match namespace {
            SYSTEM_NAMESPACE => VariableType::String,
            CONVERSATION_NAMESPACE => self
                .graph
                .variables()
                .iter()
                .find(|v| v.name == field)
                .map_or(VariableType::Any, |v| VariableType::parse(&v.data_type)),
            node_id => {
                if !self.typing.borrow_mut().insert(reference.to_string()) {
                    tracing::debug!(%reference, "reference type depends on itself");
                    return VariableType::Any;
                }
                let found = self.graph.node(node_id).and_then(|node| {
                    let mut fields = node_outputs(node, &mut |r| self.reference_type(r));
                    if node.kind.is_container() {
                        fields.extend(container_outputs(node, &mut |r| self.reference_type(r)));
                    }
                    fields.into_iter().find(|f| f.name == field && !f.system)
                });
                self.typing.borrow_mut().remove(reference);
                found.map_or(VariableType::Any, |f| f.data_type)
            }
        }
    }

    fn conversation_variables(&self) -> Vec<Variable> {
        let node = NodeRef {
            id: CONVERSATION_NAMESPACE.to_string(),
            name: "Conversation".to_string(),
            kind: None,
        };
        self.graph
            .variables()
            .iter()
            .map(|v| {
                Variable::new(
                    CONVERSATION_NAMESPACE,
                    &v.name,
                    VariableType::parse(&v.data_type),
                    node.clone(),
                )
            })
            .collect()
    }

    fn to_variables(&self, node: &GraphNode, fields: Vec<OutputField>) -> Vec<Variable> {
        let node_ref = NodeRef {
            id: node.id.clone(),
            name: node.name.clone(),
            kind: Some(node.kind.clone()),
        };
        fields
            .into_iter()
            .map(|field| {
                let namespace = if field.system { SYSTEM_NAMESPACE } else { node.id.as_str() };
                Variable::new(namespace, &field.name, field.data_type, node_ref.clone())
            })
            .collect()
    }
}

/// Resolves the variables in scope for one node without keeping the resolver around.
pub fn resolve(graph: &WorkflowGraph, node_id: &str) -> Result<Vec<Variable>, GraphError> {
    ScopeResolver::new(graph).resolve(node_id)
}
