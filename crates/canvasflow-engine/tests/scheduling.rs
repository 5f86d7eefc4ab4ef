use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;

use canvasflow_core::event::EventEmitter;
use canvasflow_core::types::*;
use canvasflow_core::FlowError;
use canvasflow_engine::{HandlerRegistry, WorkflowExecutor};
use canvasflow_test_utils::{chain, completed_log, started, trace, FailingHandler, RecordingHandler};

fn executor(registry: HandlerRegistry) -> WorkflowExecutor {
    WorkflowExecutor::new(Arc::new(registry))
}

fn prompt(id: &str, content: &str) -> Node {
    Node::new(id, "prompt").with_data("content", json!(content))
}

fn conditional(id: &str, condition: &str) -> Node {
    Node::new(id, "conditional").with_data("condition", json!(condition))
}

fn outputs(events: &[ExecutionEvent]) -> Vec<(String, serde_json::Value)> {
    events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::NodeComplete {
                node_id, output, ..
            } => Some((node_id.clone(), output.clone())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn shared_dependency_runs_once() {
    let shared = RecordingHandler::new("shared", "payload");
    let sink = RecordingHandler::new("sink", "done");
    let mut registry = HandlerRegistry::with_core();
    registry.register(shared.clone());
    registry.register(sink.clone());

    let graph = Graph::new(
        vec![
            Node::new("s", "start"),
            Node::new("a", "shared"),
            prompt("b", "left $input1"),
            prompt("c", "right $input1"),
            Node::new("d", "sink"),
        ],
        vec![
            Edge::new("s", "a"),
            Edge::new("a", "b"),
            Edge::new("a", "c"),
            Edge::new("b", "d"),
            Edge::new("c", "d"),
        ],
    );

    let events = executor(registry).collect(graph).await;
    assert_eq!(shared.call_count(), 1);
    assert_eq!(sink.call_count(), 1);
    assert_eq!(sink.calls()[0], vec![json!("left payload"), json!("right payload")]);
    assert_eq!(started(&events), vec!["s", "a", "b", "c", "d"]);
    assert_eq!(completed_log(&events).map(|log| log.len()), Some(5));
}

#[tokio::test]
async fn untaken_branch_is_skipped_transitively() {
    let graph = Graph::new(
        vec![
            Node::new("s", "start"),
            conditional("c", "false"),
            prompt("t", "yes"),
            prompt("t2", "after yes: $input1"),
            prompt("f", "no"),
        ],
        vec![
            Edge::new("s", "c"),
            Edge::from_port("c", "true", "t"),
            Edge::new("t", "t2"),
            Edge::from_port("c", "false", "f"),
        ],
    );

    let events = executor(HandlerRegistry::with_core()).collect(graph).await;
    assert_eq!(started(&events), vec!["s", "c", "f"]);

    let log = completed_log(&events).unwrap();
    let ids: Vec<&str> = log.iter().map(|e| e.node_id.as_str()).collect();
    assert_eq!(ids, vec!["s", "c", "f"]);
    assert_eq!(log[1].branch.as_deref(), Some("false"));
}

#[tokio::test]
async fn true_branch_taken() {
    let graph = Graph::new(
        vec![
            Node::new("s", "start"),
            conditional("c", r#"input == "Workflow started""#),
            prompt("t", "taken: $input1"),
            prompt("f", "not taken"),
        ],
        vec![
            Edge::new("s", "c"),
            Edge::from_port("c", "true", "t"),
            Edge::from_port("c", "false", "f"),
        ],
    );

    let events = executor(HandlerRegistry::with_core()).collect(graph).await;
    assert_eq!(started(&events), vec!["s", "c", "t"]);
    assert!(outputs(&events).contains(&("t".into(), json!("taken: Workflow started"))));
}

#[tokio::test]
async fn dead_conditional_edge_does_not_block_live_input() {
    let merge = RecordingHandler::new("merge", "merged");
    let mut registry = HandlerRegistry::with_core();
    registry.register(merge.clone());

    let graph = Graph::new(
        vec![
            Node::new("s", "start"),
            conditional("c", "false"),
            prompt("p", "side"),
            Node::new("m", "merge"),
        ],
        vec![
            Edge::new("s", "c"),
            Edge::from_port("c", "true", "m"),
            Edge::new("p", "m"),
        ],
    );

    let events = executor(registry).collect(graph).await;
    assert_eq!(merge.calls(), vec![vec![json!("side")]]);
    assert_eq!(events.last().map(|e| e.kind()), Some("complete"));
}

#[tokio::test]
async fn linear_chain_event_order() {
    let graph = Graph::new(
        vec![Node::new("a", "start"), prompt("b", "$input"), Node::new("c", "output")],
        vec![Edge::new("a", "b"), Edge::new("b", "c")],
    );

    let events = executor(HandlerRegistry::with_core()).collect(graph).await;
    assert_eq!(
        trace(&events),
        vec![
            "node_start:a",
            "node_complete:a",
            "node_start:b",
            "node_complete:b",
            "node_start:c",
            "node_complete:c",
            "complete",
        ]
    );
}

#[tokio::test]
async fn failure_halts_the_run() {
    let failing = FailingHandler::new("explode", "boom");
    let after = RecordingHandler::new("after", "never");
    let mut registry = HandlerRegistry::with_core();
    registry.register(failing.clone());
    registry.register(after.clone());

    let graph = Graph::new(
        vec![Node::new("a", "start"), Node::new("b", "explode"), Node::new("c", "after")],
        vec![Edge::new("a", "b"), Edge::new("b", "c")],
    );

    let events = executor(registry).collect(graph).await;
    assert_eq!(
        trace(&events),
        vec!["node_start:a", "node_complete:a", "node_start:b", "node_error:b", "error"]
    );
    assert_eq!(failing.call_count(), 1);
    assert_eq!(after.call_count(), 0);

    match &events[3] {
        ExecutionEvent::NodeError { error, .. } => assert!(error.contains("boom")),
        other => panic!("unexpected event {:?}", other),
    }
    match events.last() {
        Some(ExecutionEvent::Error { error }) => {
            assert!(error.contains("b"));
            assert!(error.contains("boom"));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn pure_cycle_completes_empty() {
    let graph = Graph::new(
        vec![prompt("a", "x"), prompt("b", "y")],
        vec![Edge::new("a", "b"), Edge::new("b", "a")],
    );

    let events = executor(HandlerRegistry::with_core()).collect(graph).await;
    assert_eq!(
        events,
        vec![ExecutionEvent::Complete {
            execution_log: vec![]
        }]
    );
}

#[tokio::test]
async fn cycle_fed_by_entry_is_an_error() {
    let graph = Graph::new(
        vec![Node::new("s", "start"), prompt("a", "$input"), prompt("b", "$input")],
        vec![Edge::new("s", "a"), Edge::new("a", "b"), Edge::new("b", "a")],
    );

    let events = executor(HandlerRegistry::with_core()).collect(graph).await;
    assert_eq!(started(&events), vec!["s"]);
    match events.last() {
        Some(ExecutionEvent::Error { error }) => assert!(error.contains("Cycle detected")),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn start_feeds_prompt() {
    let graph = Graph::new(
        vec![Node::new("1", "start"), prompt("2", "hi $input1")],
        vec![Edge::new("1", "2")],
    );

    let events = executor(HandlerRegistry::with_core()).collect(graph).await;
    assert_eq!(
        outputs(&events),
        vec![
            ("1".to_string(), json!("Workflow started")),
            ("2".to_string(), json!("hi Workflow started")),
        ]
    );

    let log: Vec<(&str, &str, serde_json::Value)> = completed_log(&events)
        .unwrap()
        .iter()
        .map(|e| (e.node_id.as_str(), e.node_type.as_str(), e.output.clone()))
        .collect();
    assert_eq!(
        log,
        vec![
            ("1", "start", json!("Workflow started")),
            ("2", "prompt", json!("hi Workflow started")),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn long_chain_behind_a_shortcut_edge() {
    const DEPTH: usize = 10_000;

    // `s -> sink` is listed first, so the forward walk reaches `sink`
    // before any of the chain `s -> n1 -> ... -> nN -> sink` has run.
    let mut nodes = vec![Node::new("s", "start"), Node::new("sink", "output")];
    let mut edges = vec![Edge::new("s", "sink"), Edge::new("s", "n1")];
    for i in 1..=DEPTH {
        nodes.push(prompt(&format!("n{}", i), "$input"));
        if i < DEPTH {
            edges.push(Edge::new(format!("n{}", i), format!("n{}", i + 1)));
        }
    }
    edges.push(Edge::new(format!("n{}", DEPTH), "sink"));

    let events = executor(HandlerRegistry::with_core())
        .collect(Graph::new(nodes, edges))
        .await;

    let log = completed_log(&events).unwrap();
    assert_eq!(log.len(), DEPTH + 2);

    let order = started(&events);
    assert_eq!(order.len(), DEPTH + 2);
    assert_eq!(order[1], "n1");
    assert_eq!(order[DEPTH], format!("n{}", DEPTH));
    assert_eq!(order[DEPTH + 1], "sink");

    let sink = log.last().unwrap();
    assert_eq!(sink.node_id, "sink");
    assert_eq!(sink.output, json!(["Workflow started", "Workflow started"]));
}

#[tokio::test]
async fn missing_endpoint_emits_only_error() {
    let graph = Graph::new(vec![Node::new("a", "start")], vec![Edge::new("a", "ghost")]);

    let events = executor(HandlerRegistry::with_core()).collect(graph).await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        ExecutionEvent::Error { error } => assert!(error.contains("ghost")),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn unknown_type_yields_null_and_skips_dependents() {
    let graph = Graph::new(
        vec![Node::new("s", "start"), Node::new("m", "mystery"), prompt("p", "$input")],
        vec![Edge::new("s", "m"), Edge::new("m", "p")],
    );

    let events = executor(HandlerRegistry::with_core()).collect(graph).await;
    assert_eq!(started(&events), vec!["s", "m"]);
    assert!(outputs(&events).contains(&("m".into(), serde_json::Value::Null)));
    assert_eq!(completed_log(&events).map(|log| log.len()), Some(2));
}

#[tokio::test]
async fn inputs_follow_source_position() {
    let merge = RecordingHandler::new("merge", "merged");
    let mut registry = HandlerRegistry::with_core();
    registry.register(merge.clone());

    let graph = Graph::new(
        vec![
            prompt("r", "R").at(400.0, 0.0),
            prompt("l", "L").at(10.0, 0.0),
            Node::new("m", "merge").at(600.0, 0.0),
        ],
        vec![Edge::new("r", "m"), Edge::new("l", "m")],
    );

    executor(registry).collect(graph).await;
    assert_eq!(merge.calls(), vec![vec![json!("L"), json!("R")]]);
}

#[tokio::test]
async fn dropped_receiver_cancels_run() {
    let first = RecordingHandler::new("first", "x");
    let mut registry = HandlerRegistry::with_core();
    registry.register(first.clone());
    let exec = executor(registry);

    let (emitter, rx) = EventEmitter::channel(4);
    drop(rx);
    let result = exec.execute(chain("first", &["a", "b", "c"]), emitter).await;
    assert!(matches!(result, Err(FlowError::Cancelled)));
    assert_eq!(first.call_count(), 0);
}

#[tokio::test]
async fn stream_yields_events_until_terminal() {
    let exec = executor(HandlerRegistry::with_core()).with_event_buffer(1);
    let graph = chain("prompt", &["a", "b", "c", "d"]);

    let events: Vec<ExecutionEvent> = exec.stream(graph).collect().await;
    assert_eq!(events.len(), 9);
    assert!(events.last().is_some_and(|e| e.is_terminal()));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn concurrent_runs_are_isolated() {
    let counter = RecordingHandler::new("count", "n");
    let mut registry = HandlerRegistry::with_core();
    registry.register(counter.clone());
    let exec = executor(registry);

    let (a, b) = tokio::join!(
        exec.collect(chain("count", &["x"])),
        exec.collect(chain("count", &["x"]))
    );
    assert_eq!(completed_log(&a).map(|l| l.len()), Some(1));
    assert_eq!(completed_log(&b).map(|l| l.len()), Some(1));
    assert_eq!(counter.call_count(), 2);
}
