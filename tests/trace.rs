//! Tests for folding run event streams into traces and chat history.
mod common;
use common::*;
use futures::StreamExt;
use futures::stream;
use keiro::trace::{NodeStatus, RunHandle, SubContent, consume, replay};
use keiro::prelude::*;
use std::result::Result;
use serde_json::{Map, Value, json};
use tokio_test::block_on;

fn inputs(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn started_session() -> ChatSession {
    let mut session = ChatSession::new();
    session.send("hello", Map::new()).unwrap();
    session
}

#[test]
fn test_single_node_run() {
    let mut session = started_session();
    let body = sse(&[
        ("node_start", json!({ "node_id": "n1" })),
        ("node_end", json!({ "node_id": "n1", "status": "completed", "output": { "x": 1 } })),
        ("workflow_end", json!({ "status": "completed" })),
    ]);

    assert_eq!(replay(&body, &mut session), RunStatus::Completed);

    let trace = session.current().unwrap();
    assert_eq!(trace.nodes.len(), 1);
    let node = &trace.nodes[0];
    assert_eq!(node.node_id, "n1");
    assert_eq!(node.status, NodeStatus::Completed);
    assert_eq!(node.output, json!({ "x": 1 }));
}

#[test]
fn test_node_end_without_start_is_ignored() {
    let mut session = started_session();
    let body = sse(&[
        ("node_end", json!({ "node_id": "ghost", "output": { "x": 1 } })),
        ("node_error", json!({ "node_id": "ghost", "error": "boom" })),
    ]);
    replay(&body, &mut session);

    let trace = session.current().unwrap();
    assert!(trace.node("ghost").is_none());
    assert!(trace.nodes.is_empty());
    assert_eq!(trace.status, RunStatus::Streaming);
}

#[test]
fn test_messages_accumulate_and_set_conversation() {
    let mut session = started_session();
    let body = sse(&[
        ("workflow_start", json!({ "execution_id": "exec_1" })),
        ("message", json!({ "chunk": "Hel", "conversation_id": "conv_9" })),
        ("message", json!({ "chunk": "lo" })),
        ("workflow_end", json!({ "status": "completed", "elapsed_time": 1.5 })),
    ]);
    replay(&body, &mut session);

    let trace = session.current().unwrap();
    assert_eq!(trace.content.as_deref(), Some("Hello"));
    assert_eq!(trace.execution_id.as_deref(), Some("exec_1"));
    assert_eq!(trace.elapsed_time, Some(1.5));
    assert_eq!(session.conversation_id(), Some("conv_9"));

    let next = session.send("again", Map::new()).unwrap();
    assert_eq!(next.conversation_id.as_deref(), Some("conv_9"));
}

#[test]
fn test_node_error_marks_node_failed() {
    let mut session = started_session();
    let body = sse(&[
        ("node_start", json!({ "node_id": "n1" })),
        ("node_error", json!({ "node_id": "n1", "error": "timeout", "elapsed_time": 2.0 })),
        ("workflow_end", json!({ "status": "failed", "error": "node n1 failed" })),
    ]);
    assert_eq!(replay(&body, &mut session), RunStatus::Failed);

    let trace = session.current().unwrap();
    let node = trace.node("n1").unwrap();
    assert_eq!(node.status, NodeStatus::Failed);
    assert_eq!(node.error, Some(json!("timeout")));
    assert_eq!(trace.error, Some(json!("node n1 failed")));
}

#[test]
fn test_repeated_node_start_restarts_entry() {
    let mut session = started_session();
    let body = sse(&[
        ("node_start", json!({ "node_id": "n1" })),
        ("node_end", json!({ "node_id": "n1", "output": { "i": 0 } })),
        ("node_start", json!({ "node_id": "n1" })),
    ]);
    replay(&body, &mut session);

    let trace = session.current().unwrap();
    assert_eq!(trace.nodes.len(), 1);
    assert_eq!(trace.nodes[0].status, NodeStatus::Running);
    assert_eq!(trace.nodes[0].output, Value::Null);
}

#[test]
fn test_events_after_end_are_ignored() {
    let mut session = started_session();
    replay(&sse(&[("workflow_end", json!({ "status": "completed" }))]), &mut session);

    let applied = session.apply(RunEvent::Message {
        chunk: "late".to_string(),
        conversation_id: None,
    });
    assert!(!applied);
    assert!(!session.fail(json!("late failure")));
    assert_eq!(session.status(), RunStatus::Completed);
    assert_eq!(session.current().unwrap().content, None);
}

#[test]
fn test_backend_error_event_fails_run() {
    let mut session = started_session();
    let body = sse(&[
        ("message", json!({ "chunk": "partial" })),
        ("error", json!({ "message": "internal error" })),
    ]);
    assert_eq!(replay(&body, &mut session), RunStatus::Failed);

    let item = session.items().pop().unwrap();
    assert_eq!(item.status, Some(RunStatus::Failed));
    assert_eq!(item.content, None);
    assert_eq!(item.sub_content, Some(SubContent::Error(json!({ "message": "internal error" }))));
}

#[test]
fn test_malformed_and_unknown_events_are_skipped() {
    let mut session = started_session();
    let body = "event: node_start\ndata: not json\n\n\
                event: ping\ndata: {}\n\n\
                : keep-alive\n\n\
                event: node_start\ndata: {\"node_id\": \"n2\"}\n\n";
    replay(body, &mut session);

    let trace = session.current().unwrap();
    assert_eq!(trace.nodes.len(), 1);
    assert_eq!(trace.nodes[0].node_id, "n2");
}

#[test]
fn test_required_inputs_block_send() {
    let graph = sample_graph();
    let mut session = ChatSession::for_graph(&graph);
    assert_eq!(session.required_inputs(), &["query".to_string()]);

    let err = session.send("hi", Map::new()).unwrap_err();
    assert_eq!(err, RunError::MissingInputs(vec!["query".to_string()]));
    assert_eq!(err.to_string(), "Missing required input variables: query");

    let blank = session.send("hi", inputs(json!({ "query": "   " })));
    assert!(matches!(blank, Err(RunError::MissingInputs(_))));
    assert!(session.entries().is_empty());

    let request = session.send("hi", inputs(json!({ "query": "weather" }))).unwrap();
    assert_eq!(request.run, 1);
    assert!(request.stream);
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({ "message": "hi", "variables": { "query": "weather" }, "stream": true })
    );
    assert_eq!(session.status(), RunStatus::Streaming);
}

#[test]
fn test_graph_session_labels_nodes() {
    let graph = sample_graph();
    let mut session = ChatSession::for_graph(&graph);
    session.send("hi", inputs(json!({ "query": "q" }))).unwrap();
    replay(&sse(&[("node_start", json!({ "node_id": "llm_1" }))]), &mut session);

    let node = &session.current().unwrap().nodes[0];
    assert_eq!(node.name.as_deref(), Some("Answer Draft"));
    assert_eq!(node.kind, Some(NodeKind::Llm));
}

#[test]
fn test_failed_run_keeps_history() {
    let mut session = started_session();
    session.fail(json!({ "error": "connection refused" }));
    session.send("retry", Map::new()).unwrap();
    replay(&sse(&[("workflow_end", json!({ "status": "completed" }))]), &mut session);

    let items = session.items();
    assert_eq!(items.len(), 4);
    assert_eq!(items[0].content.as_deref(), Some("hello"));
    assert_eq!(items[1].status, Some(RunStatus::Failed));
    assert_eq!(items[1].error, Some(json!({ "error": "connection refused" })));
    assert_eq!(items[3].status, Some(RunStatus::Completed));

    session.reset();
    assert!(session.entries().is_empty());
    assert_eq!(session.conversation_id(), None);
    assert_eq!(session.status(), RunStatus::Idle);
}

#[test]
fn test_consume_handles_split_chunks() {
    let mut session = started_session();
    let body = sse(&[
        ("node_start", json!({ "node_id": "n1" })),
        ("message", json!({ "chunk": "héllo" })),
        ("node_end", json!({ "node_id": "n1", "output": "ok" })),
        ("workflow_end", json!({ "status": "completed" })),
    ]);
    let bytes = body.into_bytes();
    let chunks: Vec<Result<Vec<u8>, String>> = bytes.chunks(7).map(|c| Ok(c.to_vec())).collect();
    let (_handle, registration) = RunHandle::pair();

    let status = block_on(consume(stream::iter(chunks), &mut session, registration));

    assert_eq!(status, RunStatus::Completed);
    let trace = session.current().unwrap();
    assert_eq!(trace.content.as_deref(), Some("héllo"));
    assert_eq!(trace.node("n1").unwrap().output, json!("ok"));
}

#[test]
fn test_consume_transport_error_fails_run() {
    let mut session = started_session();
    let first = sse(&[("node_start", json!({ "node_id": "n1" }))]);
    let chunks: Vec<Result<String, String>> = vec![Ok(first), Err("connection reset".to_string())];
    let (_handle, registration) = RunHandle::pair();

    let status = block_on(consume(stream::iter(chunks), &mut session, registration));

    assert_eq!(status, RunStatus::Failed);
    let trace = session.current().unwrap();
    assert_eq!(trace.failure, Some(json!({ "error": "connection reset" })));
    assert_eq!(trace.nodes.len(), 1);
}

#[test]
fn test_consume_premature_end_fails_run() {
    let mut session = started_session();
    let chunks: Vec<Result<&str, String>> = vec![Ok("event: message\ndata: {\"chunk\": \"hi\"}")];
    let (_handle, registration) = RunHandle::pair();

    let status = block_on(consume(stream::iter(chunks), &mut session, registration));

    assert_eq!(status, RunStatus::Failed);
    let trace = session.current().unwrap();
    assert_eq!(trace.failure, Some(json!("stream ended before workflow_end")));
    assert_eq!(trace.content, None);
}

#[test]
fn test_abort_mid_stream_fails_run() {
    let mut session = started_session();
    let (handle, registration) = RunHandle::pair();
    let aborter = handle.clone();
    let first = sse(&[("node_start", json!({ "node_id": "n1" }))]);
    let chunks: Vec<Result<String, String>> = vec![Ok(first)];
    let body = stream::iter(chunks)
        .inspect(move |_| aborter.abort())
        .chain(stream::pending());

    let status = block_on(consume(body, &mut session, registration));

    assert!(handle.is_aborted());
    assert_eq!(status, RunStatus::Failed);
    let trace = session.current().unwrap();
    assert_eq!(trace.failure, Some(json!("run aborted")));
    assert_eq!(trace.nodes.len(), 1);
}

#[test]
fn test_dropped_guard_aborts_run() {
    let mut session = started_session();
    let (handle, registration) = RunHandle::pair();
    drop(handle.guard());

    let body = "event: node_start\ndata: {\"node_id\": \"n1\"}\n\n";
    let chunks: Vec<Result<&str, String>> = vec![Ok(body)];
    let status = block_on(consume(stream::iter(chunks), &mut session, registration));

    assert_eq!(status, RunStatus::Failed);
    assert!(session.current().unwrap().nodes.is_empty());
}

#[test]
fn test_formatter_renders_history() {
    let mut session = started_session();
    let body = sse(&[
        ("node_start", json!({ "node_id": "n1" })),
        ("node_end", json!({ "node_id": "n1", "output": { "x": 1 }, "elapsed_time": 0.5 })),
        ("node_start", json!({ "node_id": "n2" })),
        ("message", json!({ "chunk": "done" })),
        ("workflow_end", json!({ "status": "completed", "elapsed_time": 1.0 })),
    ]);
    replay(&body, &mut session);

    let text: String = session.items().iter().map(TraceFormatter::format).collect();
    assert_eq!(
        text,
        "> hello\n\
         Run completed\n\
         ├── [completed] n1 0.500s\n\
         │   └── output: {\"x\":1}\n\
         └── [running] n2\n\
         Answer: done\n"
    );
}
