//! The backend workflow document and its translation to and from the live graph.

pub mod codec;
pub mod conversion;
pub mod types;
pub mod validator;

pub use codec::{
    ConfigCodec, codecs_for, complete_node_form, decode_node_config, encode_node_config,
};
pub use conversion::{IntoGraph, edge_label, graph_from_json};
pub use types::*;
pub use validator::{Scope, ValidationIssue, ValidationReport, validate};
