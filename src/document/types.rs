use crate::error::DocumentError;
use crate::graph::Position;
use crate::node::NodeKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;

/// The persisted workflow document exchanged with the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeItem>,
    #[serde(default)]
    pub edges: Vec<EdgeItem>,
    #[serde(default)]
    pub variables: Vec<ConversationVariable>,
    #[serde(default)]
    pub execution_config: ExecutionConfig,
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Milliseconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

fn default_active() -> bool {
    true
}

impl WorkflowConfig {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(json).map_err(|e| DocumentError::JsonParseError(e.to_string()))
    }

    /// Load a workflow document from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, DocumentError> {
        let content = fs::read_to_string(path).map_err(|e| DocumentError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(|e| DocumentError::JsonWriteError(e.to_string()))
    }
}

/// One node of the document. `config` is the backend's flat, type-specific map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<String>,
    /// Fields such as `description`, `error_handling` or `cache`, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeItem {
    pub source: String,
    pub target: String,
    /// Branch identifier: `CASE{n}` or `SUCCESS`/`ERROR`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A conversation-level variable, referenced as `conv.<name>` from any node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationVariable {
    pub name: String,
    #[serde(rename = "type", default = "default_variable_type")]
    pub data_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_variable_type() -> String {
    "string".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub max_iterations: u32,
    /// Seconds.
    pub timeout: u32,
    pub enable_cache: bool,
    pub parallel_limit: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            timeout: 600,
            enable_cache: true,
            parallel_limit: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// Document-level fields that are not part of the graph itself.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowMeta {
    pub id: Option<String>,
    pub app_id: Option<String>,
    pub execution_config: ExecutionConfig,
    pub triggers: Vec<TriggerConfig>,
    pub is_active: bool,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl Default for WorkflowMeta {
    fn default() -> Self {
        Self {
            id: None,
            app_id: None,
            execution_config: ExecutionConfig::default(),
            triggers: Vec::new(),
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }
}
