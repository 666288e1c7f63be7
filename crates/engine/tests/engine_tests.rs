//! End-to-end tests for workflow runs.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stepflow_engine::tools::tools::TextGenerator;
use stepflow_engine::tools::{ExecutionContext, LocalStorage, RetryConfig, StepHandler, ToolError};
use stepflow_engine::{
    EngineConfig, EngineError, EventKind, ExecutionStatus, RunOptions, StepSpec, StepStatus,
    WorkflowEngine,
};

fn engine() -> WorkflowEngine {
    WorkflowEngine::builder(EngineConfig::default())
        .without_builtin_catalog()
        .handler("record", RecordHandler)
        .handler("fail", FailHandler)
        .build()
        .unwrap()
}

fn steps(value: Value) -> Vec<StepSpec> {
    serde_json::from_value(value).unwrap()
}

/// Echoes its resolved params.
struct RecordHandler;

#[async_trait]
impl StepHandler for RecordHandler {
    async fn handle(
        &self,
        _step_type: &str,
        params: &Value,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ToolError> {
        Ok(params.clone())
    }
}

/// Always fails.
struct FailHandler;

#[async_trait]
impl StepHandler for FailHandler {
    async fn handle(
        &self,
        _step_type: &str,
        _params: &Value,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ToolError> {
        Err(ToolError::ExecutionFailed("intentional failure".to_string()))
    }
}

/// Fails until the given call number.
struct FlakyHandler {
    calls: Arc<AtomicU32>,
    succeed_on: u32,
}

#[async_trait]
impl StepHandler for FlakyHandler {
    async fn handle(
        &self,
        _step_type: &str,
        _params: &Value,
        _ctx: &ExecutionContext,
    ) -> Result<Value, ToolError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call < self.succeed_on {
            return Err(ToolError::Http("connection reset".to_string()));
        }
        Ok(json!({"call": call}))
    }
}

struct CannedGenerator;

#[async_trait]
impl TextGenerator for CannedGenerator {
    async fn generate(&self, prompt: &str, _hints: &Value) -> Result<String, ToolError> {
        Ok(format!("generated: {}", prompt.lines().next().unwrap_or_default()))
    }
}

fn five_steps_failing_at(k: usize) -> Vec<StepSpec> {
    let list: Vec<Value> = (1..=5)
        .map(|i| {
            let step_type = if i == k { "fail" } else { "record" };
            json!({"id": format!("s{}", i), "type": step_type, "n": i, "outputVariable": format!("out{}", i)})
        })
        .collect();
    steps(Value::Array(list))
}

#[tokio::test]
async fn greet_transform_binds_result() {
    let engine = engine();
    engine
        .register(
            "greet",
            steps(json!([{
                "id": "greet",
                "type": "transform",
                "variable": "input.name",
                "expression": "'Hello, ' + value",
                "outputVariable": "greeting"
            }])),
            None,
        )
        .unwrap();

    let summary = engine
        .run("greet", json!({"name": "Ada"}), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.results, serde_json::from_value(json!({"greeting": "Hello, Ada"})).unwrap());
    assert_eq!(summary.step_count, 1);
}

#[tokio::test]
async fn unknown_workflow_fails_without_record() {
    let engine = engine();
    let result = engine.run("ghost", json!({}), RunOptions::default()).await;

    assert_eq!(result, Err(EngineError::WorkflowNotFound("ghost".to_string())));
    assert!(engine.list_executions().is_empty());
    assert_eq!(engine.stats().total_count, 0);
}

#[tokio::test]
async fn condition_picks_branch_by_input() {
    let engine = engine();
    engine
        .register(
            "sign",
            steps(json!([{
                "id": "check",
                "type": "condition",
                "condition": "input.n > 0",
                "trueBranch": {"id": "pos", "type": "transform", "variable": "input.n", "expression": "'positive'"},
                "falseBranch": {"id": "neg", "type": "transform", "variable": "input.n", "expression": "'non-positive'"},
                "outputVariable": "sign"
            }])),
            None,
        )
        .unwrap();

    let positive = engine.run("sign", json!({"n": 3}), RunOptions::default()).await.unwrap();
    assert_eq!(positive.results.get("sign"), Some(&json!("positive")));

    let zero = engine.run("sign", json!({"n": 0}), RunOptions::default()).await.unwrap();
    assert_eq!(zero.results.get("sign"), Some(&json!("non-positive")));

    assert_eq!(engine.get_workflow("sign").unwrap().execution_count, 2);
}

#[tokio::test]
async fn failure_at_step_k_stops_the_run() {
    for k in 1..=5 {
        let engine = engine();
        engine.register("five", five_steps_failing_at(k), None).unwrap();

        let err = engine
            .run("five", json!({}), RunOptions::default())
            .await
            .unwrap_err();

        let (execution_id, step_id) = match &err {
            EngineError::StepExecution {
                execution_id,
                step_id,
                ..
            } => (execution_id.clone(), step_id.clone()),
            other => panic!("unexpected error: {:?}", other),
        };
        assert_eq!(step_id, format!("s{}", k));

        let record = engine.get_execution(&execution_id).unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(record.outcomes.len(), k);
        assert_eq!(record.outcomes[k - 1].status, StepStatus::Failed);
        assert!(record.error.as_deref().unwrap_or_default().contains("intentional failure"));
    }
}

#[tokio::test]
async fn continue_on_error_runs_every_step() {
    let engine = engine();
    engine.register("five", five_steps_failing_at(2), None).unwrap();

    let summary = engine
        .run("five", json!({}), RunOptions::continue_on_error())
        .await
        .unwrap();

    assert_eq!(summary.step_count, 5);
    assert!(summary.results.get("out2").is_none());
    assert_eq!(summary.results.len(), 4);

    let record = engine.get_execution(&summary.execution_id).unwrap();
    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(record.count_outcomes(StepStatus::Failed), 1);
}

#[tokio::test]
async fn later_steps_see_earlier_outputs() {
    let engine = engine();
    engine
        .register(
            "chain",
            steps(json!([
                {"id": "first", "type": "record", "value": "{{input.seed}}-one", "outputVariable": "x"},
                {"id": "second", "type": "record", "text": "got {{x.value}}", "outputVariable": "y"}
            ])),
            None,
        )
        .unwrap();

    let summary = engine
        .run("chain", json!({"seed": "abc"}), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.results.get("y"), Some(&json!({"text": "got abc-one"})));
}

#[tokio::test]
async fn unresolved_placeholders_are_kept() {
    let engine = engine();
    engine
        .register(
            "keep",
            steps(json!([{"id": "s", "type": "record", "text": "{{b}}", "outputVariable": "out"}])),
            None,
        )
        .unwrap();

    let summary = engine.run("keep", json!({"a": 1}), RunOptions::default()).await.unwrap();
    assert_eq!(summary.results.get("out"), Some(&json!({"text": "{{b}}"})));
}

#[tokio::test]
async fn unknown_delegate_surfaces_as_step_error() {
    let engine = engine();
    engine
        .register("mystery", steps(json!([{"id": "s", "type": "nobody"}])), None)
        .unwrap();

    let err = engine.run("mystery", json!({}), RunOptions::default()).await.unwrap_err();
    assert_eq!(
        err.tool_error(),
        Some(&ToolError::UnknownStepType("nobody".to_string()))
    );
}

#[tokio::test]
async fn generate_without_generator_is_handler_missing() {
    let engine = engine();
    engine
        .register("gen", steps(json!([{"id": "g", "type": "generate", "prompt": "hi"}])), None)
        .unwrap();

    let err = engine.run("gen", json!({}), RunOptions::default()).await.unwrap_err();
    assert!(matches!(err.tool_error(), Some(ToolError::HandlerMissing(_))));
}

#[tokio::test]
async fn retry_records_single_outcome() {
    let calls = Arc::new(AtomicU32::new(0));
    let engine = WorkflowEngine::builder(EngineConfig::default())
        .without_builtin_catalog()
        .handler(
            "flaky",
            FlakyHandler {
                calls: calls.clone(),
                succeed_on: 3,
            },
        )
        .build()
        .unwrap();

    let step = steps(json!([{"id": "f", "type": "flaky", "outputVariable": "out"}]))
        .remove(0)
        .with_retry(RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 2.0,
        });
    engine.register("retry", vec![step], None).unwrap();

    let summary = engine.run("retry", json!({}), RunOptions::default()).await.unwrap();
    assert_eq!(summary.results.get("out"), Some(&json!({"call": 3})));

    let record = engine.get_execution(&summary.execution_id).unwrap();
    assert_eq!(record.outcomes.len(), 1);
    assert_eq!(record.outcomes[0].attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn events_follow_the_run_lifecycle() {
    let engine = engine();
    engine.register("five", five_steps_failing_at(3), None).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    for kind in [
        EventKind::ExecutionStarted,
        EventKind::StepCompleted,
        EventKind::StepFailed,
        EventKind::ExecutionCompleted,
        EventKind::ExecutionFailed,
    ] {
        let seen = seen.clone();
        engine.subscribe(kind, move |event| {
            let step = event.outcome.as_ref().map(|o| o.step.id.clone());
            seen.lock().push((event.kind, step));
            Ok(())
        });
    }

    let _ = engine.run("five", json!({}), RunOptions::default()).await;
    engine.flush_events().await;

    let seen = seen.lock().clone();
    assert_eq!(
        seen,
        vec![
            (EventKind::ExecutionStarted, None),
            (EventKind::StepCompleted, Some("s1".to_string())),
            (EventKind::StepCompleted, Some("s2".to_string())),
            (EventKind::StepFailed, Some("s3".to_string())),
            (EventKind::ExecutionFailed, None),
        ]
    );
}

#[tokio::test]
async fn panicking_observer_does_not_affect_run() {
    let engine = engine();
    engine
        .register("one", steps(json!([{"id": "s", "type": "record", "outputVariable": "out"}])), None)
        .unwrap();

    engine.subscribe(EventKind::StepCompleted, |_| panic!("observer exploded"));
    engine.subscribe(EventKind::ExecutionStarted, |_| anyhow::bail!("observer refused"));

    let summary = engine.run("one", json!({}), RunOptions::default()).await.unwrap();
    engine.flush_events().await;
    let record = engine.get_execution(&summary.execution_id).unwrap();
    assert_eq!(record.status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn slow_observer_does_not_delay_run() {
    let engine = engine();
    engine
        .register(
            "shout",
            steps(json!([{
                "id": "shout",
                "type": "transform",
                "variable": "input.name",
                "function": "uppercase",
                "outputVariable": "loud"
            }])),
            None,
        )
        .unwrap();

    let delivered = Arc::new(AtomicU32::new(0));
    let counter = delivered.clone();
    engine.subscribe(EventKind::StepCompleted, move |_| {
        std::thread::sleep(Duration::from_millis(500));
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let start = Instant::now();
    let summary = engine
        .run("shout", json!({"name": "ada"}), RunOptions::default())
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(summary.results.get("loud"), Some(&json!("ADA")));
    assert!(elapsed < Duration::from_millis(400), "run took {:?}", elapsed);

    engine.flush_events().await;
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn broadcast_stream_sees_terminal_event() {
    let engine = engine();
    engine
        .register("one", steps(json!([{"id": "s", "type": "record"}])), None)
        .unwrap();

    let mut rx = engine.events();
    let summary = engine.run("one", json!({}), RunOptions::default()).await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.execution.id, summary.execution_id);
        kinds.push(event.kind);
    }
    assert_eq!(
        kinds,
        vec![
            EventKind::ExecutionStarted,
            EventKind::StepCompleted,
            EventKind::ExecutionCompleted
        ]
    );
}

#[tokio::test]
async fn retention_evicts_oldest_finished_runs() {
    let config = EngineConfig {
        execution_retention: 2,
        ..EngineConfig::default()
    };
    let engine = WorkflowEngine::builder(config)
        .without_builtin_catalog()
        .handler("record", RecordHandler)
        .build()
        .unwrap();
    engine
        .register("one", steps(json!([{"id": "s", "type": "record"}])), None)
        .unwrap();

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(engine.run("one", json!({}), RunOptions::default()).await.unwrap().execution_id);
    }

    assert!(engine.get_execution(&ids[0]).is_none());
    assert!(engine.get_execution(&ids[1]).is_some());
    assert!(engine.get_execution(&ids[2]).is_some());
    assert_eq!(engine.stats().total_count, 2);
}

#[tokio::test]
async fn parallel_results_keep_declaration_order() {
    let engine = engine();
    engine
        .register(
            "fan",
            steps(json!([{
                "id": "fan",
                "type": "parallel",
                "steps": [
                    {"id": "a", "type": "record", "v": 1},
                    {"id": "b", "type": "transform", "variable": "input.name", "function": "uppercase"},
                    {"id": "c", "type": "record", "v": 3}
                ],
                "outputVariable": "all"
            }])),
            None,
        )
        .unwrap();

    let summary = engine.run("fan", json!({"name": "ada"}), RunOptions::default()).await.unwrap();
    assert_eq!(summary.results.get("all"), Some(&json!([{"v": 1}, "ADA", {"v": 3}])));
}

#[tokio::test]
async fn file_operations_stay_inside_storage_root() {
    let temp = TempDir::new().unwrap();
    let engine = WorkflowEngine::builder(EngineConfig::default())
        .without_builtin_catalog()
        .storage(Arc::new(LocalStorage::new(temp.path())))
        .build()
        .unwrap();

    engine
        .register(
            "files",
            steps(json!([
                {"id": "w", "type": "file-operation", "operation": "write", "path": "out/{{input.name}}.txt", "content": "hi {{input.name}}"},
                {"id": "r", "type": "file-operation", "operation": "read", "path": "out/{{input.name}}.txt", "outputVariable": "text"}
            ])),
            None,
        )
        .unwrap();

    let summary = engine.run("files", json!({"name": "ada"}), RunOptions::default()).await.unwrap();
    assert_eq!(summary.results.get("text"), Some(&json!("hi ada")));

    let escape = engine
        .run("files", json!({"name": "../../escape"}), RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(escape.tool_error(), Some(ToolError::Storage(_))));
}

#[tokio::test]
async fn remote_call_non_2xx_fails_the_step() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let engine = engine();
    engine
        .register(
            "health-check",
            steps(json!([{"id": "p", "type": "remote-call", "url": "{{input.base}}{{input.path}}", "outputVariable": "health"}])),
            None,
        )
        .unwrap();

    let ok = engine
        .run("health-check", json!({"base": server.uri(), "path": "/ok"}), RunOptions::default())
        .await
        .unwrap();
    assert_eq!(ok.results.get("health"), Some(&json!({"status": "ok"})));

    let err = engine
        .run("health-check", json!({"base": server.uri(), "path": "/down"}), RunOptions::default())
        .await
        .unwrap_err();
    assert_eq!(
        err.tool_error(),
        Some(&ToolError::HttpStatus {
            status: 503,
            body: "unavailable".to_string()
        })
    );
}

#[tokio::test]
async fn builtin_code_generation_workflow_runs() {
    let temp = TempDir::new().unwrap();
    let engine = WorkflowEngine::builder(EngineConfig::default())
        .text_generator(Arc::new(CannedGenerator))
        .storage(Arc::new(LocalStorage::new(temp.path())))
        .build()
        .unwrap();

    assert_eq!(engine.stats().template_count, 3);

    let summary = engine
        .run(
            "code-generation",
            json!({"language": "Rust", "requirement": "adds two numbers", "filename": "add.rs"}),
            RunOptions::default(),
        )
        .await
        .unwrap();

    let code = summary.results.get("code").and_then(Value::as_str).unwrap();
    assert_eq!(code, "generated: Write Rust code that adds two numbers. Return only the code.");

    let saved = std::fs::read_to_string(temp.path().join("generated/add.rs")).unwrap();
    assert_eq!(saved, code);
}

#[tokio::test]
async fn remote_call_method_comes_from_input() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/sessions/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"closed": 7})))
        .mount(&server)
        .await;

    let engine = engine();
    engine
        .register(
            "close-session",
            steps(json!([{
                "id": "close",
                "type": "remote-call",
                "url": "{{input.base}}/sessions/{{input.id}}",
                "method": "{{input.verb}}",
                "timeoutSeconds": "{{input.timeout}}",
                "outputVariable": "reply"
            }])),
            None,
        )
        .unwrap();

    let summary = engine
        .run(
            "close-session",
            json!({"base": server.uri(), "id": 7, "verb": "delete", "timeout": 5}),
            RunOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(summary.results.get("reply"), Some(&json!({"closed": 7})));

    let err = engine
        .run(
            "close-session",
            json!({"base": server.uri(), "id": 7, "verb": "yeet", "timeout": 5}),
            RunOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err.tool_error(), Some(ToolError::Configuration(_))));
}
