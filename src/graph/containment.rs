use super::{GraphEvent, GraphNode, Position, Rect, Size, WorkflowGraph};
use crate::error::GraphError;
use crate::settings::EditorSettings;

/// Clamps a child's candidate position into the body of `parent`.
///
/// The body starts below the header and keeps `container_padding` on every side. When the
/// child is larger than the body the lower bound wins, and the parent must grow to fit.
pub fn clamp_child_position(
    candidate: Position,
    child: Size,
    parent: &Rect,
    settings: &EditorSettings,
) -> Position {
    let pad = settings.container_padding;
    let x = clamp_axis(candidate.x, parent.x + pad, parent.right() - pad - child.width);
    let y = clamp_axis(
        candidate.y,
        parent.y + settings.container_header + pad,
        parent.bottom() - pad - child.height,
    );
    Position::new(x, y)
}

fn clamp_axis(value: f64, low: f64, high: f64) -> f64 {
    value.min(high).max(low)
}

/// The size a container at `origin` needs to enclose `children` with padding on the far sides.
pub fn fit_container_size<'a>(
    origin: Position,
    children: impl IntoIterator<Item = &'a Rect>,
    settings: &EditorSettings,
) -> Size {
    let pad = settings.container_padding;
    children
        .into_iter()
        .fold(settings.min_container_size, |size, child| {
            size.max(Size::new(
                child.right() - origin.x + pad,
                child.bottom() - origin.y + pad,
            ))
        })
}

impl WorkflowGraph {
    /// The top-most top-level container whose bounds contain `position`.
    pub fn container_at(&self, position: Position) -> Option<&GraphNode> {
        self.nodes()
            .filter(|n| n.kind.is_container() && n.cycle.is_none())
            .filter(|n| n.rect().contains_point(position))
            .last()
    }

    /// The smallest size `container_id` may take given its current children.
    pub fn fitted_size(&self, container_id: &str) -> Result<Size, GraphError> {
        let container = self.require(container_id)?;
        let rects: Vec<Rect> = self.children(container_id).iter().map(|c| c.rect()).collect();
        Ok(fit_container_size(container.position, &rects, &self.settings))
    }

    /// Resizes a container to exactly fit its children, announcing the change if any.
    pub(crate) fn fit_container(&mut self, container_id: &str) {
        let Ok(size) = self.fitted_size(container_id) else {
            return;
        };
        let Some(container) = self.node_mut(container_id) else {
            return;
        };
        if container.size != size {
            container.size = size;
            tracing::debug!(
                container = %container_id,
                width = size.width,
                height = size.height,
                "container fitted"
            );
            self.emit(GraphEvent::NodeResized {
                id: container_id.to_string(),
                size,
            });
        }
    }

    /// Where `candidate` lands for `node_id` once clamped into its container, if it has one.
    pub(crate) fn clamped_position(&self, node_id: &str, candidate: Position) -> Position {
        let Some(node) = self.node(node_id) else {
            return candidate;
        };
        match node.cycle.as_deref().and_then(|parent| self.node(parent)) {
            Some(parent) => {
                clamp_child_position(candidate, node.size, &parent.rect(), &self.settings)
            }
            None => candidate,
        }
    }
}
