use super::{GraphEvent, WorkflowGraph};
use crate::error::GraphError;
use crate::node::{NodeKind, Port, PortGroup, branch_layout};
use serde_json::{Value, json};

/// How right-port indices move when a node's branch set changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRemap {
    /// The branch at this index is gone; later branches shift down by one.
    Removed(usize),
    /// A branch was inserted at this index; it and every later branch shift up by one.
    Inserted(usize),
    /// The branch count changed from `old` to `new` with no known edit position.
    Resized {
        old: usize,
        new: usize,
        trailing_else: bool,
    },
}

impl PortRemap {
    /// Maps an original right-port index to its new index, or `None` when its edges drop.
    pub fn apply(&self, index: usize) -> Option<usize> {
        match *self {
            PortRemap::Removed(removed) => match index.cmp(&removed) {
                std::cmp::Ordering::Less => Some(index),
                std::cmp::Ordering::Equal => None,
                std::cmp::Ordering::Greater => Some(index - 1),
            },
            PortRemap::Inserted(at) => Some(if index >= at { index + 1 } else { index }),
            PortRemap::Resized {
                old,
                new,
                trailing_else,
            } => {
                if trailing_else && new > 0 && index + 1 == old {
                    Some(new - 1)
                } else {
                    let limit = if trailing_else { new.saturating_sub(1) } else { new };
                    (index < limit).then_some(index)
                }
            }
        }
    }
}

impl WorkflowGraph {
    /// Inserts a branch before position `at` (`at == count` appends).
    ///
    /// For if-else this adds an ELIF case; the ELSE port stays last.
    pub fn insert_branch(&mut self, id: &str, at: usize) -> Result<(), GraphError> {
        let (key, blank) = self.branch_field(id)?;
        let count = self.branch_count(id, key);
        if at > count {
            return Err(GraphError::BranchOutOfRange {
                node_id: id.to_string(),
                index: at,
                count,
            });
        }
        self.edit_branches(id, key, |items| items.insert(at, blank));
        self.refresh_ports(id, PortRemap::Inserted(at))
    }

    /// Removes the branch at `index`, dropping its edges and shifting later ones down.
    pub fn remove_branch(&mut self, id: &str, index: usize) -> Result<(), GraphError> {
        let (key, _) = self.branch_field(id)?;
        let count = self.branch_count(id, key);
        if index >= count {
            return Err(GraphError::BranchOutOfRange {
                node_id: id.to_string(),
                index,
                count,
            });
        }
        if count <= 1 {
            return Err(GraphError::LastBranch(id.to_string()));
        }
        self.edit_branches(id, key, |items| {
            items.remove(index);
        });
        self.refresh_ports(id, PortRemap::Removed(index))
    }

    /// Switches an http-request node between a single output and SUCCESS/ERROR branches.
    pub fn set_error_branch(&mut self, id: &str, enabled: bool) -> Result<(), GraphError> {
        let node = self.require(id)?;
        if node.kind != NodeKind::HttpRequest {
            return Err(GraphError::NotBranching {
                node_id: id.to_string(),
                kind: node.kind.to_string(),
            });
        }
        let method = if enabled { "branch" } else { "none" };
        let mut handle = node
            .form
            .get("error_handle")
            .filter(|v| v.is_object())
            .cloned()
            .unwrap_or_else(|| json!({}));
        handle["method"] = json!(method);
        self.update_config(id, "error_handle", handle)
    }

    /// Recomputes the ports from the current config when the edit position is unknown.
    pub(crate) fn resync_ports(&mut self, id: &str) -> Result<(), GraphError> {
        let node = self.require(id)?;
        let old = node.right_ports().count();
        let layout = branch_layout(&node.kind, &node.form);
        let remap = PortRemap::Resized {
            old,
            new: layout.ports.len(),
            trailing_else: layout.trailing_else,
        };
        self.refresh_ports(id, remap)
    }

    /// Rebuilds the port set of `id` from its config and restores its edges.
    ///
    /// Runs as three ordered phases: every incident edge is detached, the ports are replaced,
    /// then edges come back. Incoming edges return as they were; outgoing edges follow
    /// `remap` by their original right-port index and keep their ids.
    pub(crate) fn refresh_ports(&mut self, id: &str, remap: PortRemap) -> Result<(), GraphError> {
        let node = self.require(id)?;
        let old_ports: Vec<String> = node.right_ports().map(|p| p.id.clone()).collect();
        let layout = branch_layout(&node.kind, &node.form);
        let mut ports: Vec<Port> = node.left_ports().cloned().collect();
        ports.extend(layout.ports);

        let detached = self.take_edges_where(|e| e.source == id || e.target == id);
        for edge in &detached {
            self.emit(GraphEvent::EdgeRemoved {
                id: edge.id.clone(),
            });
        }

        let new_ports: Vec<String> = ports
            .iter()
            .filter(|p| p.group == PortGroup::Right)
            .map(|p| p.id.clone())
            .collect();
        if let Some(node) = self.node_mut(id) {
            node.ports = ports;
        }
        self.emit(GraphEvent::PortsChanged { id: id.to_string() });

        for mut edge in detached {
            if edge.source == id {
                let target_index = old_ports
                    .iter()
                    .position(|p| *p == edge.source_port)
                    .and_then(|i| remap.apply(i));
                match target_index.and_then(|i| new_ports.get(i)) {
                    Some(port) => edge.source_port = port.clone(),
                    None => {
                        tracing::debug!(
                            edge = %edge.id,
                            port = %edge.source_port,
                            "branch edge dropped"
                        );
                        continue;
                    }
                }
            }
            let edge_id = edge.id.clone();
            self.push_edge(edge);
            self.emit(GraphEvent::EdgeAdded { id: edge_id });
        }
        Ok(())
    }

    fn branch_field(&self, id: &str) -> Result<(&'static str, Value), GraphError> {
        let node = self.require(id)?;
        match node.kind {
            NodeKind::IfElse => Ok((
                "cases",
                json!({ "logical_operator": "and", "expressions": [] }),
            )),
            NodeKind::QuestionClassifier => Ok(("categories", json!({ "class_name": "" }))),
            _ => Err(GraphError::NotBranching {
                node_id: id.to_string(),
                kind: node.kind.to_string(),
            }),
        }
    }

    fn branch_count(&self, id: &str, key: &str) -> usize {
        self.node(id).map_or(0, |n| n.form.array_len(key))
    }

    fn edit_branches(&mut self, id: &str, key: &str, edit: impl FnOnce(&mut Vec<Value>)) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let mut items = node
            .form
            .get(key)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        edit(&mut items);
        node.form.set(key, Value::Array(items));
        self.emit(GraphEvent::DataChanged { id: id.to_string() });
    }
}
