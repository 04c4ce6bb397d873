use super::{GraphEvent, GraphNode, Position, Size, WorkflowGraph};
use crate::document::{complete_node_form, decode_node_config};
use crate::error::GraphError;
use crate::node::{NodeKind, template};
use serde::Deserialize;
use serde_json::{Map, Value};

/// The HTML5 drag payload the node library attaches to a drag: `{ "type": <kind> }`.
#[derive(Debug, Deserialize)]
struct DropPayload {
    #[serde(rename = "type")]
    kind: NodeKind,
}

impl WorkflowGraph {
    /// Creates a node of `kind` at `position` and returns its id.
    ///
    /// A node dropped inside a container's bounds becomes its child. A new container gets
    /// its `cycle-start` child right away.
    pub fn add_node(&mut self, kind: NodeKind, position: Position) -> Result<String, GraphError> {
        if kind.is_reserved() {
            return Err(GraphError::ReservedKind(kind.to_string()));
        }
        let parent = self.container_at(position).map(|c| c.id.clone());
        if let Some(parent_id) = &parent {
            if kind.is_container() {
                return Err(GraphError::NestedContainer {
                    kind: kind.to_string(),
                    container_id: parent_id.clone(),
                });
            }
        }

        let id = self.spawn(kind.clone(), position, parent.clone());
        if kind.is_container() {
            let origin = Position::new(
                position.x + self.settings.container_padding,
                position.y + self.settings.container_header + self.settings.container_padding,
            );
            self.spawn(NodeKind::CycleStart, origin, Some(id.clone()));
        }
        if let Some(parent_id) = parent {
            self.fit_container(&parent_id);
        }
        Ok(id)
    }

    /// Parses a drag payload and creates the node it names.
    pub fn drop_payload(
        &mut self,
        payload: &str,
        position: Position,
    ) -> Result<String, GraphError> {
        let payload: DropPayload =
            serde_json::from_str(payload).map_err(|e| GraphError::InvalidPayload(e.to_string()))?;
        self.add_node(payload.kind, position)
    }

    fn spawn(&mut self, kind: NodeKind, position: Position, cycle: Option<String>) -> String {
        let id = self.generate_node_id(&kind);
        let node = instantiate(id.clone(), kind, position, cycle, &self.settings);
        self.insert_node(node);

        let clamped = self.clamped_position(&id, position);
        if let Some(node) = self.node_mut(&id) {
            node.position = clamped;
        }
        tracing::debug!(node = %id, x = clamped.x, y = clamped.y, "node added");
        self.emit(GraphEvent::NodeAdded { id: id.clone() });
        id
    }

    /// Removes a node with every incident edge, returning the ids of all removed nodes.
    ///
    /// Removing a container removes its children too. A `cycle-start` goes only with its
    /// container.
    pub fn remove_node(&mut self, id: &str) -> Result<Vec<String>, GraphError> {
        let node = self.require(id)?;
        let parent = node.cycle.clone();
        if node.kind == NodeKind::CycleStart
            && parent.as_deref().is_some_and(|p| self.nodes.contains_key(p))
        {
            return Err(GraphError::ProtectedNode(id.to_string()));
        }

        let mut doomed: Vec<String> = if node.kind.is_container() {
            self.children(id).iter().map(|c| c.id.clone()).collect()
        } else {
            Vec::new()
        };
        doomed.push(id.to_string());

        let edges =
            self.take_edges_where(|e| doomed.contains(&e.source) || doomed.contains(&e.target));
        for edge in edges {
            self.emit(GraphEvent::EdgeRemoved { id: edge.id });
        }
        for node_id in &doomed {
            if self.take_node(node_id).is_some() {
                self.emit(GraphEvent::NodeRemoved {
                    id: node_id.clone(),
                });
            }
        }
        tracing::debug!(node = %id, removed = doomed.len(), "node removed");

        if let Some(parent_id) = parent {
            self.fit_container(&parent_id);
        }
        Ok(doomed)
    }

    /// Moves a node and returns where it actually landed.
    ///
    /// Children are clamped to their container, which is then refitted. Moving a container
    /// carries its children along.
    pub fn move_node(&mut self, id: &str, position: Position) -> Result<Position, GraphError> {
        let node = self.require(id)?;
        let previous = node.position;
        let parent = node.cycle.clone();
        let is_container = node.kind.is_container();

        let landed = self.clamped_position(id, position);
        if let Some(node) = self.node_mut(id) {
            node.position = landed;
        }
        self.emit(GraphEvent::NodeMoved {
            id: id.to_string(),
            position: landed,
        });

        if is_container {
            let (dx, dy) = (landed.x - previous.x, landed.y - previous.y);
            let children: Vec<String> = self.children(id).iter().map(|c| c.id.clone()).collect();
            for child_id in children {
                let Some(child) = self.node_mut(&child_id) else {
                    continue;
                };
                child.position = child.position.offset(dx, dy);
                let position = child.position;
                self.emit(GraphEvent::NodeMoved {
                    id: child_id,
                    position,
                });
            }
        }
        if let Some(parent_id) = parent {
            self.fit_container(&parent_id);
        }
        Ok(landed)
    }

    /// Resizes a node. A container never becomes smaller than its children require.
    pub fn resize_node(&mut self, id: &str, size: Size) -> Result<Size, GraphError> {
        let node = self.require(id)?;
        let parent = node.cycle.clone();
        let size = if node.kind.is_container() {
            size.max(self.fitted_size(id)?)
        } else {
            size
        };

        if let Some(node) = self.node_mut(id) {
            node.size = size;
        }
        self.emit(GraphEvent::NodeResized {
            id: id.to_string(),
            size,
        });
        if let Some(parent_id) = parent {
            self.fit_container(&parent_id);
        }
        Ok(size)
    }

    pub fn rename_node(&mut self, id: &str, name: impl Into<String>) -> Result<(), GraphError> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        node.name = name.into();
        self.emit(GraphEvent::DataChanged { id: id.to_string() });
        Ok(())
    }

    /// Sets one form field. Fields that decide the branch count also rebuild the ports.
    pub fn update_config(&mut self, id: &str, key: &str, value: Value) -> Result<(), GraphError> {
        let node = self
            .node_mut(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        node.form.set(key, value);
        complete_node_form(&node.kind, &mut node.form);
        let rebuild =
            node.kind.is_branching() && matches!(key, "cases" | "categories" | "error_handle");
        self.emit(GraphEvent::DataChanged { id: id.to_string() });

        if rebuild {
            self.resync_ports(id)?;
        }
        Ok(())
    }
}

/// Builds a node from its library template.
pub(crate) fn instantiate(
    id: String,
    kind: NodeKind,
    position: Position,
    cycle: Option<String>,
    settings: &crate::settings::EditorSettings,
) -> GraphNode {
    let template = template(&kind, settings);
    let form = decode_node_config(&kind, template.config);
    GraphNode {
        id,
        kind,
        name: template.name,
        position,
        size: template.size,
        form,
        cycle,
        ports: template.ports,
        extra: Map::new(),
    }
}
