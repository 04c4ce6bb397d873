//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the keiro crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use keiro::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let config = WorkflowConfig::from_file("path/to/workflow.json")?;
//! let report = validate(&config);
//! let graph = config.into_graph(EditorSettings::default())?;
//! println!("{} nodes, valid: {}", graph.node_count(), report.is_valid());
//! # Ok(())
//! # }
//! ```

// Graph engine
pub use crate::graph::{
    GraphEdge, GraphEvent, GraphNode, Position, Rect, Size, SubscriptionId, WorkflowGraph,
};
pub use crate::node::{NodeForm, NodeKind, Port, PortGroup};
pub use crate::settings::EditorSettings;

// Documents
pub use crate::document::{IntoGraph, WorkflowConfig, validate};

// Scope
pub use crate::scope::{ScopeCache, ScopeResolver, Variable, VariableType, resolve};

// Run traces
pub use crate::trace::{ChatSession, RunEvent, RunStatus, RunTrace, TraceFormatter};

// Error types
pub use crate::error::{ConnectionError, DocumentError, GraphError, RunError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
