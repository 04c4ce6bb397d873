use crate::error::DocumentError;
use crate::graph::Size;
use serde::{Deserialize, Serialize};
use std::fs;

/// Geometry settings the graph engine uses for containment and node placement.
///
/// Every field is optional in the JSON form; missing fields take the defaults below.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Gap kept between a container's border and its children.
    pub container_padding: f64,
    /// Height of the container's title bar, which children may not overlap.
    pub container_header: f64,
    /// A container is never smaller than this, even when empty.
    pub min_container_size: Size,
    /// Size given to every non-container node on creation.
    pub default_node_size: Size,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            container_padding: 24.0,
            container_header: 48.0,
            min_container_size: Size::new(600.0, 300.0),
            default_node_size: Size::new(240.0, 80.0),
        }
    }
}

impl EditorSettings {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(json).map_err(|e| DocumentError::JsonParseError(e.to_string()))
    }

    /// Load settings from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, DocumentError> {
        let content = fs::read_to_string(path).map_err(|e| DocumentError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&content)
    }
}
