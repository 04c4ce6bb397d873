use super::codec::{decode_node_config, encode_node_config};
use super::types::{EdgeItem, NodeItem, WorkflowConfig, WorkflowMeta};
use crate::error::DocumentError;
use crate::graph::connection::check_endpoints;
use crate::graph::{GraphEdge, GraphNode, WorkflowGraph};
use crate::node::{ERROR_PORT, NodeKind, Port, PortGroup, SUCCESS_PORT, branch_layout, template};
use crate::settings::EditorSettings;
use itertools::Itertools;

/// A trait for documents that can be loaded into a live [`WorkflowGraph`].
///
/// Implement it on another document format to feed the editor without going through
/// [`WorkflowConfig`].
pub trait IntoGraph {
    /// Consumes the document and builds the graph it describes.
    fn into_graph(self, settings: EditorSettings) -> Result<WorkflowGraph, DocumentError>;
}

impl IntoGraph for WorkflowConfig {
    fn into_graph(self, settings: EditorSettings) -> Result<WorkflowGraph, DocumentError> {
        let mut graph = WorkflowGraph::new(settings);
        graph.set_meta(WorkflowMeta {
            id: self.id,
            app_id: self.app_id,
            execution_config: self.execution_config,
            triggers: self.triggers,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        });
        graph.set_variables(self.variables);

        for item in self.nodes {
            if graph.node(&item.id).is_some() {
                return Err(DocumentError::DuplicateNode(item.id));
            }
            graph.insert_node(node_from_item(item, &settings));
        }
        detach_invalid_cycles(&mut graph);

        for item in self.edges {
            if let Some(edge) = edge_from_item(&graph, item) {
                graph.push_edge(edge);
            }
        }

        let containers: Vec<String> = graph
            .nodes()
            .filter(|n| n.kind.is_container())
            .map(|n| n.id.clone())
            .collect();
        for container_id in containers {
            let children: Vec<String> = graph
                .children(&container_id)
                .iter()
                .map(|c| c.id.clone())
                .collect();
            // Container sizes are not saved; fit to the stored children before clamping.
            graph.fit_container(&container_id);
            for child_id in children {
                let Some(candidate) = graph.node(&child_id).map(|c| c.position) else {
                    continue;
                };
                let clamped = graph.clamped_position(&child_id, candidate);
                if let Some(child) = graph.node_mut(&child_id) {
                    child.position = clamped;
                }
            }
            graph.fit_container(&container_id);
        }

        tracing::debug!(nodes = graph.node_count(), edges = graph.edges().len(), "workflow loaded");
        Ok(graph)
    }
}

fn node_from_item(item: NodeItem, settings: &EditorSettings) -> GraphNode {
    let template = template(&item.kind, settings);
    let form = decode_node_config(&item.kind, item.config);
    let mut ports: Vec<Port> = template
        .ports
        .into_iter()
        .filter(|p| p.group == PortGroup::Left)
        .collect();
    ports.extend(branch_layout(&item.kind, &form).ports);

    GraphNode {
        id: item.id,
        name: item.name.unwrap_or(template.name),
        kind: item.kind,
        position: item.position.unwrap_or_default(),
        size: template.size,
        form,
        cycle: item.cycle,
        ports,
        extra: item.extra,
    }
}

/// Clears `cycle` references that do not point at a top-level container.
fn detach_invalid_cycles(graph: &mut WorkflowGraph) {
    let invalid: Vec<String> = graph
        .nodes()
        .filter(|n| {
            n.cycle.as_deref().is_some_and(|parent| {
                n.kind.is_container()
                    || !graph
                        .node(parent)
                        .is_some_and(|p| p.kind.is_container() && p.cycle.is_none())
            })
        })
        .map(|n| n.id.clone())
        .collect();
    for id in invalid {
        if let Some(node) = graph.node_mut(&id) {
            tracing::warn!(
                node = %id,
                cycle = ?node.cycle,
                "node references a missing container, detaching"
            );
            node.cycle = None;
        }
    }
}

fn edge_from_item(graph: &WorkflowGraph, item: EdgeItem) -> Option<GraphEdge> {
    let (Some(source), Some(target)) = (graph.node(&item.source), graph.node(&item.target)) else {
        tracing::warn!(
            source = %item.source,
            target = %item.target,
            "dropping edge to a missing node"
        );
        return None;
    };
    if let Err(reason) = check_endpoints(source, target) {
        tracing::warn!(
            source = %item.source,
            target = %item.target,
            %reason,
            "dropping invalid edge"
        );
        return None;
    }

    let label_port = item
        .label
        .as_deref()
        .and_then(|label| source.right_ports().find(|p| p.id == label));
    if label_port.is_none() {
        if let Some(label) = &item.label {
            tracing::warn!(
                source = %item.source,
                %label,
                "edge label matches no port, using the first output"
            );
        }
    }
    let source_port = label_port.or_else(|| source.right_ports().next())?.id.clone();
    let target_port = target.left_ports().next()?.id.clone();

    let duplicate = graph.edges().iter().any(|e| {
        e.source == item.source && e.source_port == source_port && e.target == item.target
    });
    if duplicate {
        return None;
    }

    let id = item
        .extra
        .get("id")
        .and_then(|v| v.as_str())
        .filter(|id| graph.edge(id).is_none())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}-{}-{}", item.source, source_port, item.target));

    Some(GraphEdge {
        id,
        source: item.source,
        source_port,
        target: item.target,
        target_port,
        extra: item.extra,
    })
}

impl WorkflowGraph {
    /// Serializes the graph back into the backend document.
    ///
    /// Placeholder nodes and edges touching them are left out. Edges from branching nodes
    /// carry their branch as `label`, and duplicates collapse by `(source, target, label)`.
    pub fn to_config(&self) -> WorkflowConfig {
        let nodes = self
            .nodes()
            .filter(|n| !n.kind.is_placeholder())
            .map(|n| NodeItem {
                id: n.id.clone(),
                kind: n.kind.clone(),
                name: Some(n.name.clone()),
                position: Some(n.position),
                config: encode_node_config(&n.kind, &n.form),
                cycle: n.cycle.clone(),
                extra: n.extra.clone(),
            })
            .collect();

        let edges = self
            .edges()
            .iter()
            .filter_map(|edge| {
                let source = self.node(&edge.source).filter(|n| !n.kind.is_placeholder())?;
                self.node(&edge.target).filter(|n| !n.kind.is_placeholder())?;
                Some(EdgeItem {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    label: edge_label(&source.kind, &edge.source_port),
                    extra: edge.extra.clone(),
                })
            })
            .unique_by(|e| (e.source.clone(), e.target.clone(), e.label.clone()))
            .collect();

        let meta = self.meta().clone();
        WorkflowConfig {
            id: meta.id,
            app_id: meta.app_id,
            nodes,
            edges,
            variables: self.variables().to_vec(),
            execution_config: meta.execution_config,
            triggers: meta.triggers,
            is_active: meta.is_active,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        self.to_config().to_json_pretty()
    }
}

/// The branch identifier an edge leaving `port` of a `kind` node is saved with.
pub fn edge_label(kind: &NodeKind, port: &str) -> Option<String> {
    match kind {
        NodeKind::IfElse | NodeKind::QuestionClassifier => Some(port.to_string()),
        NodeKind::HttpRequest if port == SUCCESS_PORT || port == ERROR_PORT => {
            Some(port.to_string())
        }
        _ => None,
    }
}

/// Convenience for loading straight from JSON text.
pub fn graph_from_json(
    json: &str,
    settings: EditorSettings,
) -> Result<WorkflowGraph, DocumentError> {
    WorkflowConfig::from_json(json)?.into_graph(settings)
}
