use super::resolver::resolve;
use super::types::Variable;
use crate::error::GraphError;
use crate::graph::WorkflowGraph;
use ahash::AHashMap;

/// Memoised scope lists keyed by node, valid for a single graph revision.
///
/// Any mutation of the graph bumps its revision, after which every cached list is dropped on
/// the next lookup. A stale list is never returned.
#[derive(Debug, Default)]
pub struct ScopeCache {
    revision: Option<u64>,
    entries: AHashMap<String, Vec<Variable>>,
    computed: u64,
}

impl ScopeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, graph: &WorkflowGraph, node_id: &str) -> Result<&[Variable], GraphError> {
        if self.revision != Some(graph.revision()) {
            self.entries.clear();
            self.revision = Some(graph.revision());
        }
        if !self.entries.contains_key(node_id) {
            let variables = resolve(graph, node_id)?;
            self.computed += 1;
            self.entries.insert(node_id.to_string(), variables);
        }
        Ok(self.entries.get(node_id).map(Vec::as_slice).unwrap_or(&[]))
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.revision = None;
    }

    /// How many lists have been computed rather than served from the cache.
    pub fn computed(&self) -> u64 {
        self.computed
    }
}
