use super::types::{EdgeItem, WorkflowConfig};
use crate::node::NodeKind;
use ahash::{AHashMap, AHashSet};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

/// A structural problem that keeps the backend from running a workflow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    #[error("{scope} has no start node")]
    MissingStart { scope: Scope },

    #[error("{scope} has {count} start nodes, expected exactly one")]
    MultipleStarts { scope: Scope, count: usize },

    #[error("The workflow needs at least one end node")]
    MissingEnd,

    #[error("Node id '{0}' is used more than once")]
    DuplicateNodeId(String),

    #[error("Edge '{source_id}' -> '{target_id}' references a missing node")]
    DanglingEdge { source_id: String, target_id: String },

    #[error("Node '{node_id}' names '{cycle}' as its container, which is not a loop or iteration")]
    InvalidCycle { node_id: String, cycle: String },

    #[error("Edge '{source_id}' -> '{target_id}' crosses a container boundary")]
    CrossContainerEdge { source_id: String, target_id: String },

    #[error("Nodes unreachable from the start of {scope}: {}", .nodes.join(", "))]
    Unreachable { scope: Scope, nodes: Vec<String> },

    #[error("Edges form a cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
}

/// Either the top-level graph or the body of one container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Workflow,
    Container(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Workflow => f.write_str("The workflow"),
            Scope::Container(id) => write!(f, "Container '{}'", id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Checks a document the way the execution engine does before accepting it.
///
/// Cycle detection skips edges whose `type` is `"error"` and edges touching a `loop` node,
/// so retry routes are accepted. Containers are validated as separate graphs. Reachability and cycle checks only run for a
/// scope whose basic structure is sound.
pub fn validate(config: &WorkflowConfig) -> ValidationReport {
    let mut issues = Vec::new();

    let mut seen = AHashSet::new();
    for node in &config.nodes {
        if !seen.insert(node.id.as_str()) {
            issues.push(ValidationIssue::DuplicateNodeId(node.id.clone()));
        }
    }

    let kinds: AHashMap<&str, &NodeKind> = config
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), &n.kind))
        .collect();
    let mut scope_of: AHashMap<&str, Scope> = AHashMap::new();
    for node in &config.nodes {
        let scope = match node.cycle.as_deref() {
            None => Scope::Workflow,
            Some(parent) if kinds.get(parent).is_some_and(|k| k.is_container()) => {
                Scope::Container(parent.to_string())
            }
            Some(parent) => {
                issues.push(ValidationIssue::InvalidCycle {
                    node_id: node.id.clone(),
                    cycle: parent.to_string(),
                });
                Scope::Workflow
            }
        };
        scope_of.insert(node.id.as_str(), scope);
    }

    for edge in &config.edges {
        match (scope_of.get(edge.source.as_str()), scope_of.get(edge.target.as_str())) {
            (Some(a), Some(b)) if a != b => issues.push(ValidationIssue::CrossContainerEdge {
                source_id: edge.source.clone(),
                target_id: edge.target.clone(),
            }),
            (Some(_), Some(_)) => {}
            _ => issues.push(ValidationIssue::DanglingEdge {
                source_id: edge.source.clone(),
                target_id: edge.target.clone(),
            }),
        }
    }

    let mut scopes = vec![Scope::Workflow];
    scopes.extend(
        config
            .nodes
            .iter()
            .filter(|n| n.kind.is_container())
            .map(|n| Scope::Container(n.id.clone())),
    );

    for scope in scopes {
        let members: Vec<&str> = config
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| scope_of.get(id) == Some(&scope))
            .collect();
        let member_set: AHashSet<&str> = members.iter().copied().collect();
        let scoped: Vec<&EdgeItem> = config
            .edges
            .iter()
            .filter(|e| {
                member_set.contains(e.source.as_str()) && member_set.contains(e.target.as_str())
            })
            .collect();
        let edges: Vec<(&str, &str)> = scoped
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();
        // Error routes and loop nodes may close a cycle legitimately (retry on failure).
        let cycle_edges: Vec<(&str, &str)> = scoped
            .iter()
            .filter(|e| e.extra.get("type").and_then(Value::as_str) != Some("error"))
            .filter(|e| {
                ![&e.source, &e.target]
                    .iter()
                    .any(|id| kinds.get(id.as_str()).is_some_and(|k| **k == NodeKind::Loop))
            })
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();

        let start_kind = match scope {
            Scope::Workflow => NodeKind::Start,
            Scope::Container(_) => NodeKind::CycleStart,
        };
        let starts: Vec<&str> = members
            .iter()
            .copied()
            .filter(|id| kinds.get(id).is_some_and(|k| **k == start_kind))
            .collect();

        let before = issues.len();
        match starts.len() {
            0 => issues.push(ValidationIssue::MissingStart { scope: scope.clone() }),
            1 => {}
            count => issues.push(ValidationIssue::MultipleStarts {
                scope: scope.clone(),
                count,
            }),
        }
        if scope == Scope::Workflow
            && !members
                .iter()
                .any(|id| kinds.get(id).is_some_and(|k| **k == NodeKind::End))
        {
            issues.push(ValidationIssue::MissingEnd);
        }
        if issues.len() != before {
            continue;
        }

        let reachable = reachable_from(starts[0], &edges);
        let unreachable: Vec<String> = members
            .iter()
            .filter(|id| !reachable.contains(*id))
            .filter(|id| !kinds.get(*id).is_some_and(|k| k.is_placeholder()))
            .map(|id| id.to_string())
            .collect();
        if !unreachable.is_empty() {
            issues.push(ValidationIssue::Unreachable {
                scope: scope.clone(),
                nodes: unreachable,
            });
            continue;
        }

        if let Some(path) = find_cycle(&members, &cycle_edges) {
            issues.push(ValidationIssue::Cycle { path });
        }
    }

    ValidationReport { issues }
}

fn reachable_from<'a>(start: &'a str, edges: &[(&'a str, &'a str)]) -> AHashSet<&'a str> {
    let mut reachable = AHashSet::new();
    let mut queue = VecDeque::from([start]);
    reachable.insert(start);
    while let Some(current) = queue.pop_front() {
        for &(source, target) in edges {
            if source == current && reachable.insert(target) {
                queue.push_back(target);
            }
        }
    }
    reachable
}

/// Iterative three-colour DFS; returns the first cycle found, closed on its first node.
fn find_cycle(members: &[&str], edges: &[(&str, &str)]) -> Option<Vec<String>> {
    let mut adjacency: AHashMap<&str, Vec<&str>> = AHashMap::new();
    for &(source, target) in edges {
        adjacency.entry(source).or_default().push(target);
    }

    let mut done: AHashSet<&str> = AHashSet::new();
    for &root in members {
        if done.contains(root) {
            continue;
        }
        let mut path: Vec<&str> = vec![root];
        let mut cursors: Vec<usize> = vec![0];
        loop {
            let (Some(&node), Some(&cursor)) = (path.last(), cursors.last()) else {
                break;
            };
            let next = adjacency.get(node).and_then(|n| n.get(cursor)).copied();
            if let Some(cursor) = cursors.last_mut() {
                *cursor += 1;
            }
            match next {
                Some(child) if path.contains(&child) => {
                    let start = path.iter().position(|n| *n == child).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|n| n.to_string()).collect();
                    cycle.push(child.to_string());
                    return Some(cycle);
                }
                Some(child) if !done.contains(child) => {
                    path.push(child);
                    cursors.push(0);
                }
                Some(_) => {}
                None => {
                    done.insert(node);
                    path.pop();
                    cursors.pop();
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_a_simple_cycle() {
        let members = ["a", "b", "c"];
        let edges = [("a", "b"), ("b", "c"), ("c", "b")];
        assert_eq!(
            find_cycle(&members, &edges),
            Some(vec!["b".to_string(), "c".to_string(), "b".to_string()])
        );
        assert_eq!(find_cycle(&members, &[("a", "b"), ("a", "c"), ("b", "c")]), None);
    }
}
