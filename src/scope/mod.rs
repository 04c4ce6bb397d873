//! Variable scope resolution: which upstream values a node's forms may reference.

pub mod cache;
pub mod outputs;
pub mod resolver;
pub mod types;

pub use cache::ScopeCache;
pub use outputs::{
    CONVERSATION_NAMESPACE, OutputField, SYSTEM_NAMESPACE, container_outputs, node_outputs,
};
pub use resolver::{ScopeResolver, resolve};
pub use types::{NodeRef, Variable, VariableType, parse_selector};
