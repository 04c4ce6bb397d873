use super::sse::SseFrame;
use crate::error::RunError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of a single node inside a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Running,
    Completed,
    Failed,
}

/// Lifecycle of a whole run: `idle -> streaming -> completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Streaming,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// A decoded event of the workflow-run stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    WorkflowStart {
        execution_id: Option<String>,
        conversation_id: Option<String>,
    },
    Message {
        chunk: String,
        conversation_id: Option<String>,
    },
    NodeStart {
        node_id: String,
        conversation_id: Option<String>,
        execution_id: Option<String>,
        timestamp: Option<i64>,
    },
    NodeEnd {
        node_id: String,
        input: Value,
        output: Value,
        elapsed_time: Option<f64>,
        status: Option<NodeStatus>,
    },
    NodeError {
        node_id: String,
        input: Value,
        error: Value,
        elapsed_time: Option<f64>,
    },
    WorkflowEnd {
        status: RunStatus,
        error: Option<Value>,
        elapsed_time: Option<f64>,
    },
    /// The backend reported an exception outside any node.
    Error { payload: Value },
    /// An event name this client does not handle.
    Ignored(String),
}

#[derive(Deserialize)]
struct WorkflowStartPayload {
    #[serde(default)]
    execution_id: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Deserialize)]
struct MessagePayload {
    #[serde(default)]
    chunk: String,
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Deserialize)]
struct NodeStartPayload {
    node_id: String,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    execution_id: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Deserialize)]
struct NodeEndPayload {
    node_id: String,
    #[serde(default)]
    input: Value,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    elapsed_time: Option<f64>,
    #[serde(default)]
    status: Option<NodeStatus>,
}

#[derive(Deserialize)]
struct NodeErrorPayload {
    node_id: String,
    #[serde(default)]
    input: Value,
    #[serde(default)]
    error: Value,
    #[serde(default)]
    elapsed_time: Option<f64>,
}

#[derive(Deserialize)]
struct WorkflowEndPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    elapsed_time: Option<f64>,
}

impl RunEvent {
    /// Decodes an event from its name and JSON `data`.
    pub fn parse(event: &str, data: &str) -> Result<RunEvent, RunError> {
        Ok(match event {
            "workflow_start" => {
                let p: WorkflowStartPayload = payload(event, data)?;
                RunEvent::WorkflowStart {
                    execution_id: p.execution_id,
                    conversation_id: p.conversation_id,
                }
            }
            "message" => {
                let p: MessagePayload = payload(event, data)?;
                RunEvent::Message {
                    chunk: p.chunk,
                    conversation_id: p.conversation_id,
                }
            }
            "node_start" => {
                let p: NodeStartPayload = payload(event, data)?;
                RunEvent::NodeStart {
                    node_id: p.node_id,
                    conversation_id: p.conversation_id,
                    execution_id: p.execution_id,
                    timestamp: p.timestamp,
                }
            }
            "node_end" => {
                let p: NodeEndPayload = payload(event, data)?;
                RunEvent::NodeEnd {
                    node_id: p.node_id,
                    input: p.input,
                    output: p.output,
                    elapsed_time: p.elapsed_time,
                    status: p.status,
                }
            }
            "node_error" => {
                let p: NodeErrorPayload = payload(event, data)?;
                RunEvent::NodeError {
                    node_id: p.node_id,
                    input: p.input,
                    error: p.error,
                    elapsed_time: p.elapsed_time,
                }
            }
            "workflow_end" => {
                let p: WorkflowEndPayload = payload(event, data)?;
                let status = match p.status.as_deref() {
                    Some("failed") => RunStatus::Failed,
                    _ => RunStatus::Completed,
                };
                RunEvent::WorkflowEnd {
                    status,
                    error: p.error.filter(|e| !e.is_null()),
                    elapsed_time: p.elapsed_time,
                }
            }
            "error" => RunEvent::Error {
                payload: serde_json::from_str(data)
                    .unwrap_or_else(|_| Value::String(data.to_string())),
            },
            other => RunEvent::Ignored(other.to_string()),
        })
    }

    pub fn from_frame(frame: &SseFrame) -> Result<RunEvent, RunError> {
        Self::parse(&frame.event, &frame.data)
    }

    pub fn name(&self) -> &str {
        match self {
            RunEvent::WorkflowStart { .. } => "workflow_start",
            RunEvent::Message { .. } => "message",
            RunEvent::NodeStart { .. } => "node_start",
            RunEvent::NodeEnd { .. } => "node_end",
            RunEvent::NodeError { .. } => "node_error",
            RunEvent::WorkflowEnd { .. } => "workflow_end",
            RunEvent::Error { .. } => "error",
            RunEvent::Ignored(name) => name,
        }
    }
}

fn payload<T: DeserializeOwned>(event: &str, data: &str) -> Result<T, RunError> {
    serde_json::from_str(data).map_err(|e| RunError::InvalidPayload {
        event: event.to_string(),
        message: e.to_string(),
    })
}
