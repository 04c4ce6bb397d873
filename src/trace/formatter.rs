use super::event::{NodeStatus, RunStatus};
use super::reducer::{NodeTrace, RunTrace};
use super::session::{ChatItem, Role, SubContent};
use serde_json::Value;

/// Formats run traces into human-readable trees.
pub struct TraceFormatter;

impl TraceFormatter {
    /// Format a whole run: header, one branch per node, then the streamed answer.
    pub fn format_trace(trace: &RunTrace) -> String {
        let mut out = String::new();
        out.push_str(&format!("Run {}", Self::run_status(trace.status)));
        if let Some(elapsed) = trace.elapsed_time {
            out.push_str(&format!(" in {}", Self::seconds(elapsed)));
        }
        out.push('\n');

        if let Some(raw) = &trace.failure {
            out.push_str(&format!("└── error: {}\n", Self::format_value(raw)));
        } else {
            let count = trace.nodes.len();
            for (i, node) in trace.nodes.iter().enumerate() {
                out.push_str(&Self::format_node(node, i + 1 == count));
            }
        }

        if let Some(error) = &trace.error {
            out.push_str(&format!("Error: {}\n", Self::format_value(error)));
        }
        if let Some(content) = &trace.content {
            out.push_str(&format!("Answer: {}\n", content));
        }
        out
    }

    /// Format one chat entry.
    pub fn format(item: &ChatItem) -> String {
        match item.role {
            Role::User => format!("> {}\n", item.content.as_deref().unwrap_or_default()),
            Role::Assistant => {
                let trace = RunTrace {
                    status: item.status.unwrap_or_default(),
                    content: item.content.clone(),
                    nodes: match &item.sub_content {
                        Some(SubContent::Nodes(nodes)) => nodes.clone(),
                        _ => Vec::new(),
                    },
                    failure: match &item.sub_content {
                        Some(SubContent::Error(raw)) => Some(raw.clone()),
                        _ => None,
                    },
                    ..RunTrace::default()
                };
                Self::format_trace(&trace)
            }
        }
    }

    fn format_node(node: &NodeTrace, last: bool) -> String {
        let (branch, indent) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
        let label = match &node.name {
            Some(name) => format!("{} ({})", name, node.node_id),
            None => node.node_id.clone(),
        };
        let mut out = format!("{}[{}] {}", branch, Self::node_status(node.status), label);
        if let Some(elapsed) = node.elapsed_time {
            out.push_str(&format!(" {}", Self::seconds(elapsed)));
        }
        out.push('\n');

        let mut details: Vec<(&str, &Value)> = Vec::new();
        if !node.input.is_null() {
            details.push(("input", &node.input));
        }
        if !node.output.is_null() {
            details.push(("output", &node.output));
        }
        if let Some(error) = &node.error {
            details.push(("error", error));
        }
        let count = details.len();
        for (i, (name, value)) in details.into_iter().enumerate() {
            let twig = if i + 1 == count { "└── " } else { "├── " };
            out.push_str(&format!("{}{}{}: {}\n", indent, twig, name, Self::format_value(value)));
        }
        out
    }

    fn run_status(status: RunStatus) -> &'static str {
        match status {
            RunStatus::Idle => "idle",
            RunStatus::Streaming => "streaming",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    fn node_status(status: NodeStatus) -> &'static str {
        match status {
            NodeStatus::Running => "running",
            NodeStatus::Completed => "completed",
            NodeStatus::Failed => "failed",
        }
    }

    fn seconds(value: f64) -> String {
        format!("{:.3}s", value)
    }

    /// Format a value for display.
    fn format_value(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
                _ => n.to_string(),
            },
            other => other.to_string(),
        }
    }
}
