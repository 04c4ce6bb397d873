use serde::{Deserialize, Serialize};
use std::fmt;

/// Master macro defining every node kind together with its wire tag.
///
/// Generates the enum, the tag lookup in both directions and the `ALL` table, so a new
/// node type only needs a new line here plus its arms in the exhaustive matches.
macro_rules! define_node_kinds {
    ( $( ($variant:ident, $tag:literal) ),* $(,)? ) => {
        /// The type of a workflow node.
        ///
        /// Unrecognized tags are kept verbatim in `Other` so a document written by a newer
        /// backend survives a load/save cycle.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum NodeKind {
            $( $variant, )*
            Other(String),
        }

        impl NodeKind {
            /// Every known kind, in node-library order.
            pub const ALL: &'static [NodeKind] = &[ $( NodeKind::$variant, )* ];

            pub fn as_str(&self) -> &str {
                match self {
                    $( NodeKind::$variant => $tag, )*
                    NodeKind::Other(tag) => tag.as_str(),
                }
            }

            /// Looks up a known kind by its wire tag.
            pub fn from_tag(tag: &str) -> Option<NodeKind> {
                match tag {
                    $( $tag => Some(NodeKind::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

define_node_kinds! {
    (Start, "start"),
    (End, "end"),
    (Answer, "answer"),
    (Llm, "llm"),
    (KnowledgeRetrieval, "knowledge-retrieval"),
    (IfElse, "if-else"),
    (Code, "code"),
    (JinjaRender, "jinja-render"),
    (QuestionClassifier, "question-classifier"),
    (HttpRequest, "http-request"),
    (Tool, "tool"),
    (Agent, "agent"),
    (Assigner, "assigner"),
    (VarAggregator, "var-aggregator"),
    (ParameterExtractor, "parameter-extractor"),
    (Loop, "loop"),
    (Iteration, "iteration"),
    (CycleStart, "cycle-start"),
    (Break, "break"),
    (MemoryRead, "memory-read"),
    (MemoryWrite, "memory-write"),
    (AddNode, "add-node"),
}

impl NodeKind {
    /// Loop and iteration nodes own child nodes through their `cycle` back-reference.
    pub fn is_container(&self) -> bool {
        matches!(self, NodeKind::Loop | NodeKind::Iteration)
    }

    /// Nodes whose right-side ports depend on their configuration.
    pub fn is_branching(&self) -> bool {
        matches!(
            self,
            NodeKind::IfElse | NodeKind::QuestionClassifier | NodeKind::HttpRequest
        )
    }

    pub fn accepts_incoming(&self) -> bool {
        !matches!(self, NodeKind::Start | NodeKind::CycleStart)
    }

    pub fn emits_outgoing(&self) -> bool {
        !matches!(self, NodeKind::End | NodeKind::Break)
    }

    /// Kinds the editor creates on its own and a user may not drop onto the canvas.
    pub fn is_reserved(&self) -> bool {
        matches!(self, NodeKind::CycleStart)
    }

    /// The editor's transient "pick a node" placeholder, never persisted.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, NodeKind::AddNode)
    }
}

impl From<String> for NodeKind {
    fn from(tag: String) -> Self {
        NodeKind::from_tag(&tag).unwrap_or_else(|| {
            tracing::warn!(node_type = %tag, "unknown node type, using default layout");
            NodeKind::Other(tag)
        })
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
