//! Tests for variable scope resolution.
mod common;
use common::*;
use keiro::document::ConversationVariable;
use keiro::prelude::*;
use serde_json::json;

fn values(variables: &[Variable]) -> Vec<&str> {
    variables.iter().map(|v| v.value.as_str()).collect()
}

fn conversation_variable(name: &str, data_type: &str) -> ConversationVariable {
    ConversationVariable {
        name: name.to_string(),
        data_type: data_type.to_string(),
        required: false,
        default: None,
        description: None,
    }
}

#[test]
fn test_branch_target_sees_upstream_llm_until_disconnected() {
    let mut graph = WorkflowGraph::default();
    let a = graph.add_node(NodeKind::Llm, Position::new(0.0, 0.0)).unwrap();
    let b = graph.add_node(NodeKind::IfElse, Position::new(300.0, 0.0)).unwrap();
    let c = graph.add_node(NodeKind::Answer, Position::new(600.0, 0.0)).unwrap();
    let a_to_b = graph.connect(&a, None, &b, None).unwrap();
    graph.connect(&b, Some("CASE1"), &c, None).unwrap();

    let mut cache = ScopeCache::new();
    let scope = cache.get(&graph, &c).unwrap();
    assert_eq!(values(scope), vec!["llm_1.output"]);
    assert_eq!(scope[0].data_type, VariableType::String);
    assert_eq!(scope[0].node.name, "LLM");

    graph.disconnect(&a_to_b).unwrap();

    let scope = cache.get(&graph, &c).unwrap();
    assert!(scope.is_empty());
    assert_eq!(cache.computed(), 2);
}

#[test]
fn test_cache_serves_same_revision() {
    let (graph, _, _, end) = linear_graph();
    let mut cache = ScopeCache::new();
    let first = cache.get(&graph, &end).unwrap().to_vec();
    let second = cache.get(&graph, &end).unwrap().to_vec();
    assert_eq!(first, second);
    assert_eq!(cache.computed(), 1);

    cache.invalidate();
    cache.get(&graph, &end).unwrap();
    assert_eq!(cache.computed(), 2);
    assert!(matches!(cache.get(&graph, "ghost"), Err(GraphError::NodeNotFound(_))));
}

#[test]
fn test_scope_excludes_non_ancestors() {
    let (mut graph, start, llm, end) = linear_graph();
    let stray = graph.add_node(NodeKind::Llm, Position::new(300.0, 400.0)).unwrap();
    graph.connect(&start, None, &stray, None).unwrap();

    let scope = resolve(&graph, &llm).unwrap();
    let refs = values(&scope);
    assert!(!refs.contains(&"llm_1.output"));
    assert!(!refs.contains(&stray.as_str()));
    assert!(!refs.iter().any(|r| r.starts_with("llm_2.")));
    assert!(!refs.iter().any(|r| r.starts_with(&format!("{}.", end))));
    assert_eq!(
        refs,
        vec![
            "sys.message",
            "sys.conversation_id",
            "sys.execution_id",
            "sys.workspace_id",
            "sys.user_id"
        ]
    );

    let scope = resolve(&graph, &end).unwrap();
    assert!(values(&scope).contains(&"llm_1.output"));
    assert!(!values(&scope).contains(&"llm_2.output"));
}

#[test]
fn test_conversation_variables_are_always_in_scope() {
    let mut graph = WorkflowGraph::default();
    let lonely = graph.add_node(NodeKind::Answer, Position::new(0.0, 0.0)).unwrap();
    graph.set_variables(vec![
        conversation_variable("topic", "string"),
        conversation_variable("history", "array[object]"),
    ]);

    let scope = resolve(&graph, &lonely).unwrap();
    assert_eq!(values(&scope), vec!["conv.topic", "conv.history"]);
    assert_eq!(scope[1].data_type, VariableType::ArrayObject);
    assert_eq!(scope[0].key, "conv_topic");
    assert_eq!(scope[0].label, "topic");
    assert_eq!(scope[0].node.kind, None);
}

#[test]
fn test_upstream_outputs_nearest_first() {
    let mut graph = WorkflowGraph::default();
    let start = graph.add_node(NodeKind::Start, Position::new(0.0, 0.0)).unwrap();
    let http = graph.add_node(NodeKind::HttpRequest, Position::new(300.0, 0.0)).unwrap();
    let llm = graph.add_node(NodeKind::Llm, Position::new(600.0, 0.0)).unwrap();
    let answer = graph.add_node(NodeKind::Answer, Position::new(900.0, 0.0)).unwrap();
    graph.connect(&start, None, &http, None).unwrap();
    graph.connect(&http, None, &llm, None).unwrap();
    graph.connect(&llm, None, &answer, None).unwrap();
    graph
        .update_config(&start, "variables", json!([{ "name": "query", "type": "string" }]))
        .unwrap();

    let scope = resolve(&graph, &answer).unwrap();
    let refs = values(&scope);
    assert_eq!(&refs[..5], &[
        "llm_1.output",
        "http_request_1.body",
        "http_request_1.status_code",
        "http_request_1.headers",
        "http_request_1.output"
    ]);
    assert_eq!(refs[5], "start_1.query");
    assert_eq!(scope[2].data_type, VariableType::Number);
}

#[test]
fn test_diamond_ancestors_are_deduplicated() {
    let mut graph = WorkflowGraph::default();
    let root = graph.add_node(NodeKind::Llm, Position::new(0.0, 0.0)).unwrap();
    let left = graph.add_node(NodeKind::Assigner, Position::new(300.0, -200.0)).unwrap();
    let right = graph.add_node(NodeKind::Assigner, Position::new(300.0, 200.0)).unwrap();
    let join = graph.add_node(NodeKind::Answer, Position::new(600.0, 0.0)).unwrap();
    graph.connect(&root, None, &left, None).unwrap();
    graph.connect(&root, None, &right, None).unwrap();
    graph.connect(&left, None, &join, None).unwrap();
    graph.connect(&right, None, &join, None).unwrap();

    let scope = resolve(&graph, &join).unwrap();
    assert_eq!(values(&scope), vec!["llm_1.output"]);
}

#[test]
fn test_edge_cycles_terminate() {
    let mut graph = WorkflowGraph::default();
    let a = graph.add_node(NodeKind::Llm, Position::new(0.0, 0.0)).unwrap();
    let b = graph.add_node(NodeKind::Llm, Position::new(300.0, 0.0)).unwrap();
    graph.connect(&a, None, &b, None).unwrap();
    graph.connect(&b, None, &a, None).unwrap();

    let resolver = ScopeResolver::new(&graph);
    assert_eq!(resolver.ancestors(&a), vec![b.as_str()]);
    assert_eq!(values(&resolver.resolve(&a).unwrap()), vec!["llm_2.output"]);
}

#[test]
fn test_loop_child_sees_container_and_outer_scope() {
    let graph = sample_graph();
    let scope = resolve(&graph, "llm_inner").unwrap();
    let refs = values(&scope);

    assert_eq!(refs[0], "loop_1.attempt");
    assert_eq!(scope[0].data_type, VariableType::Number);
    let expected_refs = [
        "http_1.body",
        "llm_1.output",
        "start_1.query",
        "start_1.limit",
        "sys.message",
    ];
    for expected in expected_refs {
        assert!(refs.contains(&expected), "missing {}", expected);
    }
    assert!(!refs.contains(&"code_1.result"));
    assert_eq!(&refs[refs.len() - 2..], &["conv.topic", "conv.history"]);
}

#[test]
fn test_loop_outputs_seen_downstream() {
    let graph = sample_graph();
    let scope = resolve(&graph, "end_1").unwrap();
    let refs = values(&scope);
    assert!(refs.contains(&"loop_1.attempt"));
    assert!(refs.contains(&"code_1.result"));
    assert!(!refs.contains(&"llm_inner.output"));
}

#[test]
fn test_iteration_item_takes_element_type() {
    let mut graph = WorkflowGraph::default();
    let start = graph.add_node(NodeKind::Start, Position::new(-600.0, 0.0)).unwrap();
    graph
        .update_config(&start, "variables", json!([{ "name": "items", "type": "array[object]" }]))
        .unwrap();
    let iteration = graph.add_node(NodeKind::Iteration, Position::new(0.0, 0.0)).unwrap();
    graph.connect(&start, None, &iteration, None).unwrap();
    graph
        .update_config(&iteration, "input", json!("{{ start_1.items }}"))
        .unwrap();
    let child = graph.add_node(NodeKind::Code, Position::new(300.0, 100.0)).unwrap();
    assert_eq!(graph.node(&child).unwrap().cycle.as_deref(), Some(iteration.as_str()));

    let scope = resolve(&graph, &child).unwrap();
    assert_eq!(scope[0].value, "iteration_1.item");
    assert_eq!(scope[0].data_type, VariableType::Object);
    assert_eq!(scope[1].value, "iteration_1.index");
    assert_eq!(scope[1].data_type, VariableType::Number);
    assert!(values(&scope).contains(&"start_1.items"));
}

#[test]
fn test_aggregator_output_typed_by_first_reference() {
    let mut graph = WorkflowGraph::default();
    let start = graph.add_node(NodeKind::Start, Position::new(0.0, 0.0)).unwrap();
    graph
        .update_config(&start, "variables", json!([{ "name": "n", "type": "number" }]))
        .unwrap();
    let aggregator = graph.add_node(NodeKind::VarAggregator, Position::new(300.0, 0.0)).unwrap();
    let answer = graph.add_node(NodeKind::Answer, Position::new(600.0, 0.0)).unwrap();
    graph.connect(&start, None, &aggregator, None).unwrap();
    graph.connect(&aggregator, None, &answer, None).unwrap();

    graph
        .update_config(&aggregator, "group_variables", json!(["{{ start_1.n }}", "sys.message"]))
        .unwrap();
    let scope = resolve(&graph, &answer).unwrap();
    assert_eq!(scope[0].value, "var_aggregator_1.output");
    assert_eq!(scope[0].data_type, VariableType::Number);

    graph.update_config(&aggregator, "group", json!(true)).unwrap();
    graph
        .update_config(
            &aggregator,
            "group_variables",
            json!([
                { "key": "count", "value": ["start_1.n"] },
                { "key": "text", "value": ["sys.message"] }
            ]),
        )
        .unwrap();
    let scope = resolve(&graph, &answer).unwrap();
    assert_eq!(scope[0].value, "var_aggregator_1.count");
    assert_eq!(scope[0].data_type, VariableType::Number);
    assert_eq!(scope[1].value, "var_aggregator_1.text");
    assert_eq!(scope[1].data_type, VariableType::String);
}

#[test]
fn test_self_referencing_aggregator_is_untyped() {
    let mut graph = WorkflowGraph::default();
    let aggregator = graph.add_node(NodeKind::VarAggregator, Position::new(0.0, 0.0)).unwrap();
    let answer = graph.add_node(NodeKind::Answer, Position::new(300.0, 0.0)).unwrap();
    graph.connect(&aggregator, None, &answer, None).unwrap();
    graph
        .update_config(&aggregator, "group_variables", json!(["var_aggregator_1.output"]))
        .unwrap();

    let scope = resolve(&graph, &answer).unwrap();
    assert_eq!(scope[0].data_type, VariableType::Any);
}

#[test]
fn test_unknown_node_kind_publishes_nothing() {
    let json = r#"{
      "nodes": [
        { "id": "x", "type": "vector-store", "config": {} },
        { "id": "a", "type": "answer", "config": {} }
      ],
      "edges": [ { "source": "x", "target": "a" } ]
    }"#;
    let graph = keiro::document::graph_from_json(json, EditorSettings::default()).unwrap();
    assert_eq!(graph.node("x").unwrap().kind, NodeKind::Other("vector-store".to_string()));
    assert_eq!(graph.edges().len(), 1);
    assert!(resolve(&graph, "a").unwrap().is_empty());
}
