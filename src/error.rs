use thiserror::Error;

/// Reasons an edge may not be created between two nodes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Node '{node_id}' is a start node and cannot receive connections")]
    TargetIsStart { node_id: String },

    #[error("Node '{node_id}' is an end node and cannot emit connections")]
    SourceIsEnd { node_id: String },

    #[error("Node '{node_id}' cannot connect to itself")]
    SelfLoop { node_id: String },

    #[error(
        "Nodes '{source_id}' and '{target_id}' live in different containers and cannot be connected"
    )]
    CrossContainer { source_id: String, target_id: String },

    #[error("Node '{node_id}' has no {side} port named '{port_id}'")]
    UnknownPort {
        node_id: String,
        port_id: String,
        side: &'static str,
    },

    #[error("An edge from '{source_id}' ({source_port}) to '{target_id}' already exists")]
    Duplicate {
        source_id: String,
        source_port: String,
        target_id: String,
    },
}

/// Errors raised by structural edits on a `WorkflowGraph`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node '{0}' not found in the graph")]
    NodeNotFound(String),

    #[error("Edge '{0}' not found in the graph")]
    EdgeNotFound(String),

    #[error("Invalid connection: {0}")]
    InvalidConnection(#[from] ConnectionError),

    #[error("A '{kind}' node cannot be placed inside container '{container_id}'")]
    NestedContainer { kind: String, container_id: String },

    #[error("Node '{0}' is owned by its container and cannot be removed on its own")]
    ProtectedNode(String),

    #[error("Node '{0}' cannot be created directly")]
    ReservedKind(String),

    #[error("Node '{node_id}' of type '{kind}' has no editable branches")]
    NotBranching { node_id: String, kind: String },

    #[error("Branch index {index} is out of range for node '{node_id}' with {count} branches")]
    BranchOutOfRange {
        node_id: String,
        index: usize,
        count: usize,
    },

    #[error("Node '{0}' must keep at least one branch")]
    LastBranch(String),

    #[error("Invalid drop payload: {0}")]
    InvalidPayload(String),
}

/// Errors that can occur while loading or saving a workflow document.
#[derive(Error, Debug, Clone)]
pub enum DocumentError {
    #[error("Failed to parse workflow JSON: {0}")]
    JsonParseError(String),

    #[error("Failed to serialize workflow JSON: {0}")]
    JsonWriteError(String),

    #[error("Node id '{0}' appears more than once")]
    DuplicateNode(String),

    #[error("Could not read '{path}': {message}")]
    Io { path: String, message: String },
}

/// Errors surfaced while preparing or consuming a workflow run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunError {
    #[error("Missing required input variables: {}", .0.join(", "))]
    MissingInputs(Vec<String>),

    #[error("Malformed '{event}' event payload: {message}")]
    InvalidPayload { event: String, message: String },

    #[error("Run stream failed: {0}")]
    Stream(String),
}
