//! Admission Integration Tests
//!
//! One request in flight per controller; queued requests see heartbeats and
//! give up at the wait cap.

use std::sync::Arc;
use std::time::Duration;

use interpreter_bridge::{ControllerSettings, ExecutionRequest, OutputEvent, WAITING_STATUS};

use super::support::*;

async fn wait_until_busy(controller: &interpreter_bridge::InterpreterController) {
    for _ in 0..200 {
        if controller.is_busy() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("first request was never admitted");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_request_waits_for_first() {
    let engine = Arc::new(
        ScriptedEngine::new("gpt-4o")
            .turn(vec![message("first starts"), sleep_ms(150), message("first ends")])
            .turn(vec![message("second")]),
    );
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, fast_settings());

    let first = controller.run(ExecutionRequest::new("one"));
    wait_until_busy(&controller).await;
    let second = controller.run(ExecutionRequest::new("two"));

    let (first, second) = tokio::join!(collect(first), collect(second));

    assert_eq!(
        first,
        vec![
            OutputEvent::message("first starts"),
            OutputEvent::message("first ends"),
        ]
    );
    assert!(
        matches!(&second[0], OutputEvent::Status { label, .. } if label == WAITING_STATUS),
        "second request must report waiting first: {:?}",
        second
    );
    assert_eq!(second.last(), Some(&OutputEvent::message("second")));
    assert_eq!(engine.max_active(), 1);
    assert_eq!(engine.chat_messages(), vec!["one".to_string(), "two".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_queue_timeout_reports_busy_backend() {
    let engine = Arc::new(
        ScriptedEngine::new("gpt-4o").turn(vec![message("working"), sleep_ms(500)]),
    );
    let runner = Arc::new(RecordingRunner::new(""));
    let settings = ControllerSettings {
        queue_wait_cap_ms: 100,
        queue_poll_ms: 20,
        queue_heartbeat_ms: 1_000,
        ..Default::default()
    };
    let controller = controller(&engine, &runner, settings);

    let first = controller.run(ExecutionRequest::new("one"));
    wait_until_busy(&controller).await;
    let second = collect(controller.run(ExecutionRequest::new("two"))).await;

    assert!(matches!(&second[0], OutputEvent::Status { label, .. } if label == WAITING_STATUS));
    assert_eq!(
        second.last(),
        Some(&OutputEvent::error(
            "Agent backend is busy for too long. Please retry shortly."
        ))
    );
    assert!(second[1..second.len() - 1]
        .iter()
        .all(|e| matches!(e, OutputEvent::Status { .. })));

    assert_eq!(collect(first).await, vec![OutputEvent::message("working")]);
    assert_eq!(engine.chat_messages().len(), 1);
}

#[tokio::test]
async fn test_slot_released_after_each_request() {
    let engine = Arc::new(
        ScriptedEngine::new("gpt-4o")
            .turn(vec![message("a")])
            .turn(vec![message("b")]),
    );
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, fast_settings());

    assert_eq!(
        collect(controller.run(ExecutionRequest::new("one"))).await,
        vec![OutputEvent::message("a")]
    );
    assert!(!controller.is_busy());
    assert_eq!(
        collect(controller.run(ExecutionRequest::new("two"))).await,
        vec![OutputEvent::message("b")]
    );
}
