use super::event::{RunEvent, RunStatus};
use super::reducer::{NodeTrace, RunTrace};
use crate::error::RunError;
use crate::graph::WorkflowGraph;
use crate::node::NodeKind;
use ahash::AHashMap;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// What an assistant entry shows beneath its text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SubContent {
    Nodes(Vec<NodeTrace>),
    /// Raw error payload of a failed transport.
    Error(Value),
}

/// A display-ready chat entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatItem {
    pub role: Role,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(rename = "subContent", skip_serializing_if = "Option::is_none")]
    pub sub_content: Option<SubContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl From<&RunTrace> for ChatItem {
    fn from(trace: &RunTrace) -> Self {
        let sub_content = match &trace.failure {
            Some(raw) => SubContent::Error(raw.clone()),
            None => SubContent::Nodes(trace.nodes.clone()),
        };
        ChatItem {
            role: Role::Assistant,
            content: trace.content.clone(),
            status: Some(trace.status),
            sub_content: Some(sub_content),
            error: trace.error.clone().or_else(|| trace.failure.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEntry {
    User(String),
    Assistant(RunTrace),
}

/// Body of the run request sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRequest {
    /// Index of the assistant entry this run streams into.
    #[serde(skip)]
    pub run: usize,
    pub message: String,
    pub variables: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub stream: bool,
}

/// The debug chat of one workflow: history, conversation id and the run in progress.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    entries: Vec<SessionEntry>,
    conversation_id: Option<String>,
    required_inputs: Vec<String>,
    labels: AHashMap<String, (String, NodeKind)>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session that knows the graph's required start inputs and node names.
    pub fn for_graph(graph: &WorkflowGraph) -> Self {
        let required_inputs = graph
            .nodes()
            .filter(|n| n.kind == NodeKind::Start && n.cycle.is_none())
            .filter_map(|n| n.form.get("variables").and_then(Value::as_array))
            .flatten()
            .filter(|v| v.get("required").and_then(Value::as_bool).unwrap_or(false))
            .filter_map(|v| v.get("name").and_then(Value::as_str).map(str::to_string))
            .collect();
        let labels = graph
            .nodes()
            .map(|n| (n.id.clone(), (n.name.clone(), n.kind.clone())))
            .collect();
        Self {
            required_inputs,
            labels,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn required_inputs(&self) -> &[String] {
        &self.required_inputs
    }

    /// Starts a run. Fails without touching the history if a required input is unset.
    pub fn send(
        &mut self,
        message: impl Into<String>,
        inputs: Map<String, Value>,
    ) -> Result<RunRequest, RunError> {
        let missing: Vec<String> = self
            .required_inputs
            .iter()
            .filter(|name| is_unset(inputs.get(name.as_str())))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(RunError::MissingInputs(missing));
        }

        let message = message.into();
        self.entries.push(SessionEntry::User(message.clone()));
        self.entries.push(SessionEntry::Assistant(RunTrace::streaming()));
        Ok(RunRequest {
            run: self.entries.len() - 1,
            message,
            variables: inputs,
            conversation_id: self.conversation_id.clone(),
            stream: true,
        })
    }

    /// The most recent run.
    pub fn current(&self) -> Option<&RunTrace> {
        self.entries.iter().rev().find_map(|entry| match entry {
            SessionEntry::Assistant(trace) => Some(trace),
            SessionEntry::User(_) => None,
        })
    }

    fn current_mut(&mut self) -> Option<&mut RunTrace> {
        self.entries.iter_mut().rev().find_map(|entry| match entry {
            SessionEntry::Assistant(trace) => Some(trace),
            SessionEntry::User(_) => None,
        })
    }

    pub fn status(&self) -> RunStatus {
        self.current().map_or(RunStatus::Idle, |t| t.status)
    }

    /// Applies an event to the current run, labelling new node entries.
    pub fn apply(&mut self, event: RunEvent) -> bool {
        let started = match &event {
            RunEvent::NodeStart { node_id, .. } => Some(node_id.clone()),
            _ => None,
        };
        let labels = &self.labels;
        let Some(trace) = self
            .entries
            .iter_mut()
            .rev()
            .find_map(|entry| match entry {
                SessionEntry::Assistant(trace) => Some(trace),
                SessionEntry::User(_) => None,
            })
        else {
            tracing::debug!(event = event.name(), "event without a run ignored");
            return false;
        };

        let applied = trace.apply(event);
        if let (true, Some(node_id)) = (applied, started) {
            if let (Some(node), Some((name, kind))) = (
                trace.nodes.iter_mut().find(|n| n.node_id == node_id),
                labels.get(&node_id),
            ) {
                node.name = Some(name.clone());
                node.kind = Some(kind.clone());
            }
        }
        if let Some(id) = trace.conversation_id.clone() {
            self.conversation_id = Some(id);
        }
        applied
    }

    /// Marks the current run failed after a transport error.
    pub fn fail(&mut self, raw: Value) -> bool {
        self.current_mut().is_some_and(|trace| trace.fail(raw))
    }

    /// Display entries for the whole history.
    pub fn items(&self) -> Vec<ChatItem> {
        self.entries
            .iter()
            .map(|entry| match entry {
                SessionEntry::User(text) => ChatItem {
                    role: Role::User,
                    content: Some(text.clone()),
                    status: None,
                    sub_content: None,
                    error: None,
                },
                SessionEntry::Assistant(trace) => ChatItem::from(trace),
            })
            .collect()
    }

    /// Forgets the history and the conversation, keeping what was learnt from the graph.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.conversation_id = None;
    }
}

fn is_unset(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}
