use super::event::{NodeStatus, RunEvent, RunStatus};
use crate::node::NodeKind;
use serde::Serialize;
use serde_json::Value;

/// Execution record of one node within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeTrace {
    pub node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeKind>,
    pub status: NodeStatus,
    pub input: Value,
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<f64>,
}

impl NodeTrace {
    fn started(node_id: String) -> Self {
        Self {
            node_id,
            name: None,
            kind: None,
            status: NodeStatus::Running,
            input: Value::Null,
            output: Value::Null,
            error: None,
            elapsed_time: None,
        }
    }

    fn restart(&mut self) {
        self.status = NodeStatus::Running;
        self.input = Value::Null;
        self.output = Value::Null;
        self.error = None;
        self.elapsed_time = None;
    }
}

/// The state folded from one run's events.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunTrace {
    pub status: RunStatus,
    /// Streamed assistant text; `None` once a run ends without any.
    pub content: Option<String>,
    pub nodes: Vec<NodeTrace>,
    /// Error reported by `workflow_end`.
    pub error: Option<Value>,
    /// Raw payload of a transport or backend failure, shown in place of the node list.
    pub failure: Option<Value>,
    pub execution_id: Option<String>,
    pub conversation_id: Option<String>,
    pub elapsed_time: Option<f64>,
}

impl RunTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// A run that has been sent and awaits its first event.
    pub fn streaming() -> Self {
        Self {
            status: RunStatus::Streaming,
            ..Self::default()
        }
    }

    pub fn node(&self, node_id: &str) -> Option<&NodeTrace> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    fn node_mut(&mut self, node_id: &str) -> Option<&mut NodeTrace> {
        self.nodes.iter_mut().find(|n| n.node_id == node_id)
    }

    /// Folds one event into the trace. Returns `false` when the event had no effect.
    ///
    /// Once the run is completed or failed every further event is ignored.
    pub fn apply(&mut self, event: RunEvent) -> bool {
        if self.status.is_terminal() {
            tracing::debug!(event = event.name(), "event after run end ignored");
            return false;
        }
        if self.status == RunStatus::Idle {
            self.status = RunStatus::Streaming;
        }

        match event {
            RunEvent::WorkflowStart {
                execution_id,
                conversation_id,
            } => {
                self.execution_id = execution_id.or(self.execution_id.take());
                self.conversation_id = conversation_id.or(self.conversation_id.take());
            }
            RunEvent::Message {
                chunk,
                conversation_id,
            } => {
                self.content.get_or_insert_with(String::new).push_str(&chunk);
                if conversation_id.is_some() {
                    self.conversation_id = conversation_id;
                }
            }
            RunEvent::NodeStart {
                node_id,
                conversation_id,
                execution_id,
                ..
            } => {
                match self.node_mut(&node_id) {
                    Some(existing) => existing.restart(),
                    None => self.nodes.push(NodeTrace::started(node_id)),
                }
                if conversation_id.is_some() {
                    self.conversation_id = conversation_id;
                }
                if execution_id.is_some() {
                    self.execution_id = execution_id;
                }
            }
            RunEvent::NodeEnd {
                node_id,
                input,
                output,
                elapsed_time,
                status,
            } => {
                let Some(node) = self.node_mut(&node_id) else {
                    tracing::debug!(node = %node_id, "node_end without node_start ignored");
                    return false;
                };
                node.status = status.unwrap_or(NodeStatus::Completed);
                node.input = input;
                node.output = output;
                node.elapsed_time = elapsed_time;
            }
            RunEvent::NodeError {
                node_id,
                input,
                error,
                elapsed_time,
            } => {
                let Some(node) = self.node_mut(&node_id) else {
                    tracing::debug!(node = %node_id, "node_error without node_start ignored");
                    return false;
                };
                node.status = NodeStatus::Failed;
                node.input = input;
                node.output = Value::Null;
                node.error = Some(error);
                node.elapsed_time = elapsed_time;
            }
            RunEvent::WorkflowEnd {
                status,
                error,
                elapsed_time,
            } => {
                self.status = status;
                self.error = error;
                self.elapsed_time = elapsed_time;
                if self.content.as_deref() == Some("") {
                    self.content = None;
                }
            }
            RunEvent::Error { payload } => {
                self.fail(payload);
            }
            RunEvent::Ignored(_) => return false,
        }
        true
    }

    /// Ends the run as failed with `raw` as the error to show. No effect after the run ended.
    pub fn fail(&mut self, raw: Value) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        tracing::warn!(error = %raw, "run failed");
        self.status = RunStatus::Failed;
        self.content = None;
        self.failure = Some(raw);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn start(id: &str) -> RunEvent {
        RunEvent::NodeStart {
            node_id: id.to_string(),
            conversation_id: None,
            execution_id: None,
            timestamp: None,
        }
    }

    #[test]
    fn repeated_start_resets_the_entry() {
        let mut trace = RunTrace::streaming();
        trace.apply(start("loop_body"));
        trace.apply(RunEvent::NodeEnd {
            node_id: "loop_body".to_string(),
            input: json!({ "i": 0 }),
            output: json!({ "i": 1 }),
            elapsed_time: Some(0.1),
            status: None,
        });
        trace.apply(start("loop_body"));

        assert_eq!(trace.nodes.len(), 1);
        assert_eq!(trace.nodes[0].status, NodeStatus::Running);
        assert_eq!(trace.nodes[0].output, Value::Null);
    }

    #[test]
    fn chunks_append_in_order() {
        let mut trace = RunTrace::streaming();
        for chunk in ["Hel", "lo"] {
            trace.apply(RunEvent::Message {
                chunk: chunk.to_string(),
                conversation_id: None,
            });
        }
        assert_eq!(trace.content.as_deref(), Some("Hello"));
    }

    #[test]
    fn empty_content_becomes_none_at_end() {
        let mut trace = RunTrace::streaming();
        trace.apply(RunEvent::Message {
            chunk: String::new(),
            conversation_id: None,
        });
        trace.apply(RunEvent::WorkflowEnd {
            status: RunStatus::Completed,
            error: None,
            elapsed_time: None,
        });
        assert_eq!(trace.content, None);
        assert!(!trace.apply(start("late")));
        assert!(trace.nodes.is_empty());
    }

    #[test]
    fn failure_clears_content_and_keeps_raw_error() {
        let mut trace = RunTrace::streaming();
        trace.apply(RunEvent::Message {
            chunk: "partial".to_string(),
            conversation_id: None,
        });
        assert!(trace.fail(json!({ "error": "connection reset" })));
        assert_eq!(trace.status, RunStatus::Failed);
        assert_eq!(trace.content, None);
        assert_eq!(trace.failure, Some(json!({ "error": "connection reset" })));
        assert!(!trace.fail(json!("again")));
    }
}
