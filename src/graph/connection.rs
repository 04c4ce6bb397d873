use super::{GraphEdge, GraphEvent, GraphNode, WorkflowGraph};
use crate::error::{ConnectionError, GraphError};
use crate::node::{LEFT_PORT, PortGroup, RIGHT_PORT};

impl WorkflowGraph {
    /// Checks whether an edge could be created, without creating it.
    pub fn can_connect(
        &self,
        source: &str,
        source_port: Option<&str>,
        target: &str,
        target_port: Option<&str>,
    ) -> Result<(), GraphError> {
        self.resolve_connection(source, source_port, target, target_port)
            .map(|_| ())
    }

    /// Creates an edge after validating it, returning the new edge id.
    ///
    /// Without an explicit port the first right port of `source` and the first left port of
    /// `target` are used.
    pub fn connect(
        &mut self,
        source: &str,
        source_port: Option<&str>,
        target: &str,
        target_port: Option<&str>,
    ) -> Result<String, GraphError> {
        let (source_port, target_port) =
            self.resolve_connection(source, source_port, target, target_port)?;
        let id = self.generate_edge_id();
        tracing::debug!(edge = %id, %source, %source_port, %target, "edge added");
        self.push_edge(GraphEdge {
            id: id.clone(),
            source: source.to_string(),
            source_port,
            target: target.to_string(),
            target_port,
            extra: Default::default(),
        });
        self.emit(GraphEvent::EdgeAdded { id: id.clone() });
        Ok(id)
    }

    pub fn disconnect(&mut self, edge_id: &str) -> Result<GraphEdge, GraphError> {
        let mut removed = self.take_edges_where(|e| e.id == edge_id);
        let edge = removed
            .pop()
            .ok_or_else(|| GraphError::EdgeNotFound(edge_id.to_string()))?;
        self.emit(GraphEvent::EdgeRemoved {
            id: edge.id.clone(),
        });
        Ok(edge)
    }

    fn resolve_connection(
        &self,
        source_id: &str,
        source_port: Option<&str>,
        target_id: &str,
        target_port: Option<&str>,
    ) -> Result<(String, String), GraphError> {
        let source = self.require(source_id)?;
        let target = self.require(target_id)?;
        check_endpoints(source, target)?;

        let source_port = pick_port(source, source_port, PortGroup::Right)?;
        let target_port = pick_port(target, target_port, PortGroup::Left)?;

        let duplicate = self.edges.iter().any(|e| {
            e.source == source_id
                && e.source_port == source_port
                && e.target == target_id
                && e.target_port == target_port
        });
        if duplicate {
            return Err(ConnectionError::Duplicate {
                source_id: source_id.to_string(),
                source_port,
                target_id: target_id.to_string(),
            }
            .into());
        }
        Ok((source_port, target_port))
    }
}

/// Kind and containment rules that hold regardless of ports.
pub(crate) fn check_endpoints(
    source: &GraphNode,
    target: &GraphNode,
) -> Result<(), ConnectionError> {
    if source.id == target.id {
        return Err(ConnectionError::SelfLoop {
            node_id: source.id.clone(),
        });
    }
    if !target.kind.accepts_incoming() {
        return Err(ConnectionError::TargetIsStart {
            node_id: target.id.clone(),
        });
    }
    if !source.kind.emits_outgoing() {
        return Err(ConnectionError::SourceIsEnd {
            node_id: source.id.clone(),
        });
    }
    if source.cycle != target.cycle {
        return Err(ConnectionError::CrossContainer {
            source_id: source.id.clone(),
            target_id: target.id.clone(),
        });
    }
    Ok(())
}

fn pick_port(
    node: &GraphNode,
    requested: Option<&str>,
    group: PortGroup,
) -> Result<String, ConnectionError> {
    let side = match group {
        PortGroup::Left => "left",
        PortGroup::Right => "right",
    };
    let found = match requested {
        Some(port_id) => node
            .ports
            .iter()
            .find(|p| p.group == group && p.id == port_id),
        None => node.ports.iter().find(|p| p.group == group),
    };
    found.map(|p| p.id.clone()).ok_or_else(|| {
        let fallback = match group {
            PortGroup::Left => LEFT_PORT,
            PortGroup::Right => RIGHT_PORT,
        };
        ConnectionError::UnknownPort {
            node_id: node.id.clone(),
            port_id: requested.unwrap_or(fallback).to_string(),
            side,
        }
    })
}
