//! Common test utilities for building graphs, documents and event streams.
use keiro::prelude::*;
use serde_json::Value;

/// A complete document touching every codec and every branching kind.
///
/// Layout: `start -> llm -> if-else`, with `CASE1 -> code`, `CASE2 -> http`,
/// `CASE3 (ELSE) -> end`; `http` branches `SUCCESS -> loop`, `ERROR -> end`; `loop` holds
/// `cycle-start -> llm_inner`.
#[allow(dead_code)]
pub const SAMPLE_WORKFLOW_JSON: &str = r#"{
  "id": "wf_1",
  "app_id": "app_1",
  "nodes": [
    {
      "id": "start_1", "type": "start", "name": "Start",
      "position": { "x": 0.0, "y": 0.0 },
      "config": { "variables": [
        { "name": "query", "type": "string", "required": true },
        { "name": "limit", "type": "number", "required": false }
      ] }
    },
    {
      "id": "llm_1", "type": "llm", "name": "Answer Draft",
      "position": { "x": 300.0, "y": 0.0 },
      "config": {
        "model_id": "m1",
        "messages": [
          { "role": "system", "content": "be brief" },
          { "role": "user", "content": "{{ sys.message }}" }
        ],
        "memory": { "enable": true, "enable_window": false, "window_size": 20 },
        "temperature": 0.7
      },
      "description": "drafts an answer"
    },
    {
      "id": "if_else_1", "type": "if-else", "name": "Route",
      "position": { "x": 600.0, "y": 0.0 },
      "config": { "cases": [
        { "logical_operator": "and", "expressions": [] },
        { "logical_operator": "or", "expressions": [] }
      ] }
    },
    {
      "id": "code_1", "type": "code", "name": "Post Process",
      "position": { "x": 900.0, "y": -200.0 },
      "config": {
        "language": "python3",
        "code": "cHJpbnQoMSk=",
        "output_variables": [ { "name": "result", "type": "number" } ]
      }
    },
    {
      "id": "http_1", "type": "http-request", "name": "Fetch",
      "position": { "x": 900.0, "y": 0.0 },
      "config": {
        "method": "GET",
        "url": "https://example.com",
        "headers": { "Accept": "application/json", "X-Trace": "1" },
        "params": { "q": "{{ start_1.query }}" },
        "error_handle": { "method": "branch" }
      }
    },
    {
      "id": "loop_1", "type": "loop", "name": "Retry",
      "position": { "x": 1200.0, "y": 0.0 },
      "config": { "cycle_vars": [ { "name": "attempt", "type": "number" } ], "max_loop": 3 }
    },
    {
      "id": "cycle_start_1", "type": "cycle-start", "name": "Cycle Start",
      "position": { "x": 1224.0, "y": 72.0 }, "config": {}, "cycle": "loop_1"
    },
    {
      "id": "llm_inner", "type": "llm", "name": "Inner",
      "position": { "x": 1500.0, "y": 72.0 },
      "config": { "model_id": "m2", "messages": [], "memory": { "enable": false } },
      "cycle": "loop_1"
    },
    {
      "id": "end_1", "type": "end", "name": "End",
      "position": { "x": 1800.0, "y": 0.0 }, "config": { "output": "{{ llm_1.output }}" }
    }
  ],
  "edges": [
    { "source": "start_1", "target": "llm_1" },
    { "source": "llm_1", "target": "if_else_1" },
    { "source": "if_else_1", "target": "code_1", "label": "CASE1" },
    { "source": "if_else_1", "target": "http_1", "label": "CASE2" },
    { "source": "if_else_1", "target": "end_1", "label": "CASE3" },
    { "source": "code_1", "target": "end_1" },
    { "source": "http_1", "target": "loop_1", "label": "SUCCESS" },
    { "source": "http_1", "target": "end_1", "label": "ERROR" },
    { "source": "loop_1", "target": "end_1" },
    { "source": "cycle_start_1", "target": "llm_inner", "id": "inner_edge" }
  ],
  "variables": [
    { "name": "topic", "type": "string", "required": false },
    { "name": "history", "type": "array[object]", "required": false }
  ],
  "execution_config": { "max_iterations": 50, "timeout": 120, "enable_cache": false, "parallel_limit": 2 },
  "triggers": [],
  "is_active": true,
  "created_at": 1700000000000
}"#;

#[allow(dead_code)]
pub fn sample_config() -> WorkflowConfig {
    WorkflowConfig::from_json(SAMPLE_WORKFLOW_JSON).expect("sample workflow should parse")
}

#[allow(dead_code)]
pub fn sample_graph() -> WorkflowGraph {
    sample_config()
        .into_graph(EditorSettings::default())
        .expect("sample workflow should load")
}

/// `start -> llm -> end`, returning the graph and the three ids.
#[allow(dead_code)]
pub fn linear_graph() -> (WorkflowGraph, String, String, String) {
    let mut graph = WorkflowGraph::default();
    let start = graph.add_node(NodeKind::Start, Position::new(0.0, 0.0)).unwrap();
    let llm = graph.add_node(NodeKind::Llm, Position::new(300.0, 0.0)).unwrap();
    let end = graph.add_node(NodeKind::End, Position::new(600.0, 0.0)).unwrap();
    graph.connect(&start, None, &llm, None).unwrap();
    graph.connect(&llm, None, &end, None).unwrap();
    (graph, start, llm, end)
}

/// Adds a loop container far from everything else and returns `(loop_id, cycle_start_id)`.
#[allow(dead_code)]
pub fn add_loop(graph: &mut WorkflowGraph, position: Position) -> (String, String) {
    let loop_id = graph.add_node(NodeKind::Loop, position).unwrap();
    let cycle_start = graph
        .children(&loop_id)
        .iter()
        .find(|c| c.kind == NodeKind::CycleStart)
        .map(|c| c.id.clone())
        .expect("a new container has a cycle-start child");
    (loop_id, cycle_start)
}

/// Renders `(event, data)` pairs as a `text/event-stream` body.
#[allow(dead_code)]
pub fn sse(events: &[(&str, Value)]) -> String {
    events
        .iter()
        .map(|(event, data)| format!("event: {}\ndata: {}\n\n", event, data))
        .collect()
}

#[allow(dead_code)]
pub fn port_ids(graph: &WorkflowGraph, node_id: &str) -> Vec<String> {
    graph
        .node(node_id)
        .map(|n| n.right_ports().map(|p| p.id.clone()).collect())
        .unwrap_or_default()
}

/// `(source_port, target)` of every edge leaving `node_id`.
#[allow(dead_code)]
pub fn outgoing_ports(graph: &WorkflowGraph, node_id: &str) -> Vec<(String, String)> {
    graph
        .outgoing(node_id)
        .map(|e| (e.source_port.clone(), e.target.clone()))
        .collect()
}
