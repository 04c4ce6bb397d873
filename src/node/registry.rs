use super::{NodeForm, NodeKind};
use crate::graph::Size;
use crate::settings::EditorSettings;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub const LEFT_PORT: &str = "left";
pub const RIGHT_PORT: &str = "right";
pub const CASE_PREFIX: &str = "CASE";
pub const SUCCESS_PORT: &str = "SUCCESS";
pub const ERROR_PORT: &str = "ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortGroup {
    Left,
    Right,
}

/// A connection point on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub group: PortGroup,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Port {
    pub fn left() -> Self {
        Self {
            id: LEFT_PORT.to_string(),
            group: PortGroup::Left,
            text: None,
        }
    }

    pub fn right() -> Self {
        Self {
            id: RIGHT_PORT.to_string(),
            group: PortGroup::Right,
            text: None,
        }
    }

    pub fn branch(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group: PortGroup::Right,
            text: Some(text.into()),
        }
    }
}

/// `CASE{n}` for a zero-based branch index.
pub fn case_port_id(index: usize) -> String {
    format!("{}{}", CASE_PREFIX, index + 1)
}

/// The node-library entry for one kind: what a freshly dropped node looks like.
#[derive(Debug, Clone)]
pub struct NodeTemplate {
    pub kind: NodeKind,
    pub name: String,
    pub size: Size,
    pub ports: Vec<Port>,
    /// Default configuration in wire shape.
    pub config: Map<String, Value>,
}

/// Builds the library entry for `kind`.
pub fn template(kind: &NodeKind, settings: &EditorSettings) -> NodeTemplate {
    let config = default_config(kind);
    let size = if kind.is_container() {
        settings.min_container_size
    } else {
        settings.default_node_size
    };

    let form = NodeForm::from_config(config.clone());
    let mut ports = Vec::new();
    if kind.accepts_incoming() {
        ports.push(Port::left());
    }
    ports.extend(branch_layout(kind, &form).ports);

    NodeTemplate {
        kind: kind.clone(),
        name: default_name(kind).to_string(),
        size,
        ports,
        config,
    }
}

/// The right-side port set of a node, derived purely from its configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchLayout {
    pub ports: Vec<Port>,
    /// The last port is a catch-all (`ELSE`) that always stays last.
    pub trailing_else: bool,
}

pub fn branch_layout(kind: &NodeKind, form: &NodeForm) -> BranchLayout {
    match kind {
        NodeKind::IfElse => {
            let cases = form.array_len("cases").max(1);
            let mut ports: Vec<Port> = (0..cases)
                .map(|i| Port::branch(case_port_id(i), if i == 0 { "IF" } else { "ELIF" }))
                .collect();
            ports.push(Port::branch(case_port_id(cases), "ELSE"));
            BranchLayout {
                ports,
                trailing_else: true,
            }
        }
        NodeKind::QuestionClassifier => {
            let categories = form
                .get("categories")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let ports = categories
                .iter()
                .enumerate()
                .map(|(i, category)| {
                    let text = category
                        .get("class_name")
                        .and_then(Value::as_str)
                        .filter(|name| !name.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| case_port_id(i));
                    Port::branch(case_port_id(i), text)
                })
                .collect();
            BranchLayout {
                ports,
                trailing_else: false,
            }
        }
        NodeKind::HttpRequest => {
            let ports = if form.nested_str("error_handle", "method") == Some("branch") {
                vec![
                    Port::branch(SUCCESS_PORT, SUCCESS_PORT),
                    Port::branch(ERROR_PORT, ERROR_PORT),
                ]
            } else {
                vec![Port::right()]
            };
            BranchLayout {
                ports,
                trailing_else: false,
            }
        }
        NodeKind::End | NodeKind::Break | NodeKind::AddNode => BranchLayout {
            ports: Vec::new(),
            trailing_else: false,
        },
        NodeKind::Start
        | NodeKind::Answer
        | NodeKind::Llm
        | NodeKind::KnowledgeRetrieval
        | NodeKind::Code
        | NodeKind::JinjaRender
        | NodeKind::Tool
        | NodeKind::Agent
        | NodeKind::Assigner
        | NodeKind::VarAggregator
        | NodeKind::ParameterExtractor
        | NodeKind::Loop
        | NodeKind::Iteration
        | NodeKind::CycleStart
        | NodeKind::MemoryRead
        | NodeKind::MemoryWrite
        | NodeKind::Other(_) => BranchLayout {
            ports: vec![Port::right()],
            trailing_else: false,
        },
    }
}

fn default_name(kind: &NodeKind) -> &str {
    match kind {
        NodeKind::Start => "Start",
        NodeKind::End => "End",
        NodeKind::Answer => "Answer",
        NodeKind::Llm => "LLM",
        NodeKind::KnowledgeRetrieval => "Knowledge Retrieval",
        NodeKind::IfElse => "If/Else",
        NodeKind::Code => "Code",
        NodeKind::JinjaRender => "Template",
        NodeKind::QuestionClassifier => "Question Classifier",
        NodeKind::HttpRequest => "HTTP Request",
        NodeKind::Tool => "Tool",
        NodeKind::Agent => "Agent",
        NodeKind::Assigner => "Variable Assigner",
        NodeKind::VarAggregator => "Variable Aggregator",
        NodeKind::ParameterExtractor => "Parameter Extractor",
        NodeKind::Loop => "Loop",
        NodeKind::Iteration => "Iteration",
        NodeKind::CycleStart => "Cycle Start",
        NodeKind::Break => "Break",
        NodeKind::MemoryRead => "Memory Read",
        NodeKind::MemoryWrite => "Memory Write",
        NodeKind::AddNode => "Add Node",
        NodeKind::Other(tag) => tag.as_str(),
    }
}

fn default_config(kind: &NodeKind) -> Map<String, Value> {
    let value = match kind {
        NodeKind::Start => json!({ "variables": [] }),
        NodeKind::End => json!({ "output": "" }),
        NodeKind::Answer => json!({ "answer": "" }),
        NodeKind::Llm => json!({
            "model_id": "",
            "context": "",
            "messages": [{ "role": "system", "content": "" }],
            "memory": { "enable": false, "enable_window": false, "window_size": 20 },
            "temperature": 0.7,
            "max_tokens": 1000
        }),
        NodeKind::KnowledgeRetrieval => json!({
            "query": "",
            "knowledge_bases": [],
            "reranker_id": null,
            "reranker_top_k": 4
        }),
        NodeKind::IfElse => json!({
            "cases": [{ "logical_operator": "and", "expressions": [] }]
        }),
        NodeKind::Code => json!({
            "language": "python3",
            "code": "",
            "input_variables": [],
            "output_variables": []
        }),
        NodeKind::JinjaRender => json!({ "template": "", "mapping": [] }),
        NodeKind::QuestionClassifier => json!({
            "model_id": "",
            "input_variable": "",
            "categories": [{ "class_name": "" }, { "class_name": "" }],
            "user_supplement_prompt": ""
        }),
        NodeKind::HttpRequest => json!({
            "method": "GET",
            "url": "",
            "auth": { "auth_type": "none", "header": "", "api_key": "" },
            "headers": {},
            "params": {},
            "body": { "content_type": "none", "data": "" },
            "verify_ssl": true,
            "timeouts": { "connect_timeout": 5, "read_timeout": 5, "write_timeout": 5 },
            "retry": { "max_attempts": 1, "retry_interval": 100 },
            "error_handle": { "method": "none" }
        }),
        NodeKind::Tool => json!({ "tool_id": "", "tool_parameters": {} }),
        NodeKind::Agent => json!({ "agent_id": "", "message": "" }),
        NodeKind::Assigner => json!({ "assignments": [] }),
        NodeKind::VarAggregator => json!({
            "group": false,
            "group_variables": [],
            "group_type": {}
        }),
        NodeKind::ParameterExtractor => json!({
            "model_id": "",
            "text": "",
            "params": [],
            "prompt": ""
        }),
        NodeKind::Loop => json!({
            "condition": { "logical_operator": "and", "expressions": [] },
            "cycle_vars": [],
            "max_loop": 10
        }),
        NodeKind::Iteration => json!({
            "input": "",
            "parallel": false,
            "parallel_count": 4,
            "flatten": false,
            "output": "",
            "output_type": "array[string]"
        }),
        NodeKind::MemoryRead => json!({ "message": "", "config_id": "", "search_switch": "0" }),
        NodeKind::MemoryWrite => json!({ "message": "", "config_id": "" }),
        NodeKind::CycleStart | NodeKind::Break | NodeKind::AddNode | NodeKind::Other(_) => {
            json!({})
        }
    };
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn right_ids(layout: &BranchLayout) -> Vec<&str> {
        layout.ports.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn if_else_has_else_after_cases() {
        let mut form = NodeForm::new();
        form.set("cases", json!([{}, {}]));
        let layout = branch_layout(&NodeKind::IfElse, &form);
        assert_eq!(right_ids(&layout), vec!["CASE1", "CASE2", "CASE3"]);
        assert_eq!(layout.ports[2].text.as_deref(), Some("ELSE"));
        assert!(layout.trailing_else);
    }

    #[test]
    fn classifier_ports_follow_categories() {
        let mut form = NodeForm::new();
        form.set("categories", json!([{ "class_name": "billing" }, { "class_name": "" }]));
        let layout = branch_layout(&NodeKind::QuestionClassifier, &form);
        assert_eq!(right_ids(&layout), vec!["CASE1", "CASE2"]);
        assert_eq!(layout.ports[0].text.as_deref(), Some("billing"));
        assert_eq!(layout.ports[1].text.as_deref(), Some("CASE2"));
    }

    #[test]
    fn http_error_branch_switches_ports() {
        let mut form = NodeForm::new();
        form.set("error_handle", json!({ "method": "none" }));
        assert_eq!(right_ids(&branch_layout(&NodeKind::HttpRequest, &form)), vec!["right"]);
        form.set("error_handle", json!({ "method": "branch" }));
        assert_eq!(
            right_ids(&branch_layout(&NodeKind::HttpRequest, &form)),
            vec!["SUCCESS", "ERROR"]
        );
    }

    #[test]
    fn start_and_end_templates_have_one_side() {
        let settings = EditorSettings::default();
        let start = template(&NodeKind::Start, &settings);
        assert!(start.ports.iter().all(|p| p.group == PortGroup::Right));
        let end = template(&NodeKind::End, &settings);
        assert!(end.ports.iter().all(|p| p.group == PortGroup::Left));
    }
}
