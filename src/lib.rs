//! # Keiro - Workflow Graph State Engine
//!
//! **Keiro** owns the state behind a visual AI-pipeline editor: the live graph of nodes,
//! ports and edges, loop/iteration containment, the variable scope of every node, the
//! translation to and from the backend's workflow document, and the trace of a debug run
//! streamed back over server-sent events. Rendering and form widgets live elsewhere and
//! consume the typed data exposed here.
//!
//! ## Core Workflow
//!
//! 1.  **Load**: Parse the backend document into a `WorkflowConfig` and turn it into a live
//!     `WorkflowGraph` with `IntoGraph::into_graph`.
//! 2.  **Edit**: Add, move, connect and configure nodes. Branching nodes rebuild their ports
//!     and remap edges; containers clamp and fit their children. Every change bumps the
//!     graph revision and is announced to subscribers.
//! 3.  **Resolve scope**: Ask a `ScopeResolver` (or a `ScopeCache`) which variables a node
//!     may reference.
//! 4.  **Save**: `WorkflowGraph::to_config` produces the backend document again.
//! 5.  **Run**: A `ChatSession` validates inputs, and `consume` folds the run's event
//!     stream into a `RunTrace`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keiro::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let mut graph = WorkflowGraph::new(EditorSettings::default());
//!     let start = graph.add_node(NodeKind::Start, Position::new(0.0, 0.0))?;
//!     let llm = graph.add_node(NodeKind::Llm, Position::new(300.0, 0.0))?;
//!     let end = graph.add_node(NodeKind::End, Position::new(600.0, 0.0))?;
//!     graph.connect(&start, None, &llm, None)?;
//!     graph.connect(&llm, None, &end, None)?;
//!
//!     for variable in resolve(&graph, &end)? {
//!         println!("{} ({})", variable.value, variable.data_type);
//!     }
//!
//!     println!("{}", graph.to_json_pretty()?);
//!     Ok(())
//! }
//! ```

pub mod document;
pub mod error;
pub mod graph;
pub mod node;
pub mod prelude;
pub mod scope;
pub mod settings;
pub mod trace;
