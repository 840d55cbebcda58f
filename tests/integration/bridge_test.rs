//! Bridge Integration Tests
//!
//! Heartbeats while the worker is quiet, a caller that walks away, and a
//! worker that dies mid-request.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use interpreter_bridge::{
    ControllerSettings, ExecutionEngine, ExecutionRequest, InterpreterController, OutputEvent,
    BACKEND_STATUS,
};

use super::support::*;

const NOTEPAD_PAYLOAD: &str =
    r#"{"name": "execute", "arguments": {"language": "powershell", "code": "Start-Process notepad.exe"}}"#;

async fn wait_until_idle(controller: &InterpreterController) {
    for _ in 0..200 {
        if !controller.is_busy() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("request never released its slot");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_quiet_worker_gets_backend_heartbeats() {
    let engine = Arc::new(
        ScriptedEngine::new("gpt-4o").turn(vec![sleep_ms(350), message("late")]),
    );
    let runner = Arc::new(RecordingRunner::new(""));
    let settings = ControllerSettings {
        backend_heartbeat_ms: 100,
        ..Default::default()
    };
    let controller = controller(&engine, &runner, settings);

    let events = collect(controller.run(ExecutionRequest::new("wait"))).await;

    let heartbeat = OutputEvent::status(BACKEND_STATUS, json!({ "heartbeat_seconds": 0.1 }));
    assert!(events.len() >= 2, "expected heartbeats before the reply: {:?}", events);
    assert_eq!(events.last(), Some(&OutputEvent::message("late")));
    assert!(
        events[..events.len() - 1].iter().all(|e| *e == heartbeat),
        "only heartbeats may precede the reply: {:?}",
        events
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_stream_stops_request() {
    let mut steps = Vec::new();
    for i in 0..20 {
        steps.push(message(&format!("line {}", i)));
        steps.push(sleep_ms(30));
    }
    let engine = Arc::new(ScriptedEngine::new("gpt-4o").turn(steps));
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let mut stream = controller.run(ExecutionRequest::new("talk"));
    let first = tokio_stream::StreamExt::next(&mut stream).await;
    assert_eq!(first, Some(OutputEvent::message("line 0")));
    drop(stream);

    wait_until_idle(&controller).await;

    assert!(engine.resets() >= 1);
    assert!(engine.pulled() < 20);
    assert!(!controller.is_busy());
}

#[tokio::test]
async fn test_worker_panic_reports_one_generic_error() {
    let engine = Arc::new(
        ScriptedEngine::new("gpt-4o")
            .turn(vec![message(NOTEPAD_PAYLOAD)])
            .turn(vec![message("Still here.")]),
    );
    let runner = Arc::new(PanickingRunner);
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("open notepad"))).await;

    assert_eq!(events.len(), 2, "{:?}", events);
    assert!(matches!(&events[0], OutputEvent::ToolUse { name, .. } if name == "run_powershell"));
    assert_eq!(
        errors(&events),
        vec!["Agent error: the execution worker stopped unexpectedly".to_string()]
    );
    assert!(!errors(&events)[0].contains("secret"));

    assert_eq!(engine.system_prompt(), "You are a desktop assistant.");
    assert!(engine.resets() >= 1);
    assert!(!controller.is_busy());

    assert_eq!(
        collect(controller.run(ExecutionRequest::new("hello"))).await,
        vec![OutputEvent::message("Still here.")]
    );
}
