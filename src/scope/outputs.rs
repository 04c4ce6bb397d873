use super::types::{VariableType, parse_selector};
use crate::graph::GraphNode;
use crate::node::{NodeForm, NodeKind};
use serde_json::Value;

/// Namespace of the system variables published by the start node.
pub const SYSTEM_NAMESPACE: &str = "sys";
/// Namespace of conversation-level variables.
pub const CONVERSATION_NAMESPACE: &str = "conv";

const SYSTEM_VARIABLES: &[&str] = &[
    "message",
    "conversation_id",
    "execution_id",
    "workspace_id",
    "user_id",
];

/// One output a node publishes to its downstream nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputField {
    pub name: String,
    pub data_type: VariableType,
    /// Published under `sys.` instead of the node id.
    pub system: bool,
}

impl OutputField {
    fn new(name: impl Into<String>, data_type: VariableType) -> Self {
        Self {
            name: name.into(),
            data_type,
            system: false,
        }
    }
}

/// The outputs `node` exposes to nodes downstream of it.
///
/// `type_of` resolves the type of a dotted reference, which the variable aggregator needs to
/// type its output after its inputs.
pub fn node_outputs(
    node: &GraphNode,
    type_of: &mut dyn FnMut(&str) -> VariableType,
) -> Vec<OutputField> {
    use VariableType as T;
    let form = &node.form;
    match &node.kind {
        NodeKind::Start => {
            let mut fields = declared(form, "variables");
            fields.extend(SYSTEM_VARIABLES.iter().map(|name| OutputField {
                name: name.to_string(),
                data_type: T::String,
                system: true,
            }));
            fields
        }
        NodeKind::Llm | NodeKind::Agent | NodeKind::JinjaRender | NodeKind::MemoryWrite => {
            vec![OutputField::new("output", T::String)]
        }
        NodeKind::HttpRequest => vec![
            OutputField::new("body", T::String),
            OutputField::new("status_code", T::Number),
            OutputField::new("headers", T::Object),
            OutputField::new("output", T::String),
        ],
        NodeKind::Tool => vec![
            OutputField::new("data", T::String),
            OutputField::new("error_code", T::String),
            OutputField::new("execution_time", T::Number),
        ],
        NodeKind::MemoryRead => vec![
            OutputField::new("answer", T::String),
            OutputField::new("intermediate_outputs", T::ArrayObject),
        ],
        NodeKind::KnowledgeRetrieval => vec![OutputField::new("output", T::ArrayString)],
        NodeKind::QuestionClassifier => vec![
            OutputField::new("class_name", T::String),
            OutputField::new("output", T::String),
        ],
        NodeKind::Code => declared(form, "output_variables"),
        NodeKind::ParameterExtractor => declared(form, "params"),
        NodeKind::VarAggregator => aggregator_outputs(form, type_of),
        NodeKind::Iteration => {
            let output_type = form
                .get("output_type")
                .and_then(Value::as_str)
                .map_or(T::Any, VariableType::parse);
            vec![OutputField::new("output", output_type)]
        }
        NodeKind::Loop => declared(form, "cycle_vars"),
        NodeKind::End
        | NodeKind::Answer
        | NodeKind::IfElse
        | NodeKind::Assigner
        | NodeKind::CycleStart
        | NodeKind::Break
        | NodeKind::AddNode
        | NodeKind::Other(_) => Vec::new(),
    }
}

/// The variables a container injects into its own children.
pub fn container_outputs(
    node: &GraphNode,
    type_of: &mut dyn FnMut(&str) -> VariableType,
) -> Vec<OutputField> {
    match node.kind {
        NodeKind::Loop => declared(&node.form, "cycle_vars"),
        NodeKind::Iteration => {
            let item_type = node
                .form
                .get("input")
                .and_then(Value::as_str)
                .and_then(parse_selector)
                .map_or(VariableType::Any, |reference| type_of(reference).element_type());
            vec![
                OutputField::new("item", item_type),
                OutputField::new("index", VariableType::Number),
            ]
        }
        _ => Vec::new(),
    }
}

/// A list of `{ name, type }` declarations stored under `key`.
fn declared(form: &NodeForm, key: &str) -> Vec<OutputField> {
    form.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let name = item.get("name")?.as_str().filter(|n| !n.is_empty())?;
                    let data_type = item
                        .get("type")
                        .and_then(Value::as_str)
                        .map_or(VariableType::String, VariableType::parse);
                    Some(OutputField::new(name, data_type))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn aggregator_outputs(
    form: &NodeForm,
    type_of: &mut dyn FnMut(&str) -> VariableType,
) -> Vec<OutputField> {
    let grouped = form.get("group").and_then(Value::as_bool).unwrap_or(false);
    let Some(entries) = form.get("group_variables").and_then(Value::as_array) else {
        return vec![OutputField::new("output", VariableType::Any)];
    };

    let mut first_type = |refs: Option<&Value>| {
        refs.and_then(Value::as_array)
            .and_then(|r| r.first())
            .and_then(Value::as_str)
            .and_then(parse_selector)
            .map_or(VariableType::Any, |reference| type_of(reference))
    };

    if grouped {
        entries
            .iter()
            .filter_map(|group| {
                let name = group.get("key")?.as_str()?;
                Some(OutputField::new(name, first_type(group.get("value"))))
            })
            .collect()
    } else {
        let list = Value::Array(entries.clone());
        vec![OutputField::new("output", first_type(Some(&list)))]
    }
}
