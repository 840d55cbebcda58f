//! Quota Fallback Integration Tests

use std::sync::Arc;

use serde_json::json;

use interpreter_bridge::{
    ControllerSettings, EngineError, ExecutionEngine, ExecutionRequest, OutputEvent,
};

use super::support::*;

#[tokio::test]
async fn test_quota_error_replays_once_on_fallback_model() {
    let engine = Arc::new(
        ScriptedEngine::new("gemini/gemini-2.5-pro")
            .refuse(EngineError::rate_limited("429 RESOURCE_EXHAUSTED: quota exceeded"))
            .turn(vec![message("Fallback answer.")]),
    );
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("open notepad"))).await;

    assert_eq!(
        events,
        vec![
            OutputEvent::status(
                "gemini_quota_fallback",
                json!({"from_model": "gemini/gemini-2.5-pro", "to_model": "gemini-2.5-flash"}),
            ),
            OutputEvent::message("🔁 Gemini quota reached. Retrying once with `gemini-2.5-flash`..."),
            OutputEvent::message("Fallback answer."),
        ]
    );
    assert_eq!(
        engine.chat_models(),
        vec!["gemini/gemini-2.5-pro".to_string(), "gemini-2.5-flash".to_string()]
    );
    assert_eq!(engine.model(), "gemini/gemini-2.5-pro");
}

#[tokio::test]
async fn test_display_quota_and_failed_replay() {
    let engine = Arc::new(
        ScriptedEngine::new("openai/gemini-2.5-pro")
            .turn(vec![Step::Display(
                "429 Too Many Requests from generativelanguage.googleapis.com".to_string(),
            )])
            .refuse(EngineError::provider("RESOURCE_EXHAUSTED")),
    );
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("open notepad"))).await;

    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], OutputEvent::Status { label, .. } if label == "gemini_quota_fallback"));
    assert_eq!(
        events[2],
        OutputEvent::error(
            "❌ Gemini quota/rate limit reached.\n\n\
             Automatic fallback to `gemini-2.5-flash` was attempted and also failed.\n\
             Check your Google AI Studio quota/API key and retry later."
        )
    );
    assert_eq!(
        engine.chat_models(),
        vec!["openai/gemini-2.5-pro".to_string(), "openai/gemini-2.5-flash".to_string()]
    );
    assert_eq!(engine.model(), "openai/gemini-2.5-pro");
}

#[tokio::test]
async fn test_replay_relays_prose_only() {
    let engine = Arc::new(
        ScriptedEngine::new("gemini-2.5-pro")
            .refuse(EngineError::rate_limited("quota exceeded"))
            .turn(vec![
                message("Opening Notepad."),
                code("powershell", "Start-Process notepad.exe"),
                console_start(),
                console_output("done"),
                console_end(),
            ]),
    );
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("open notepad"))).await;

    assert_eq!(events.last(), Some(&OutputEvent::message("Opening Notepad.")));
    assert_eq!(tool_uses(&events), 0);
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_ineligible_provider_reports_quota_without_replay() {
    let engine = Arc::new(
        ScriptedEngine::new("gpt-4o").refuse(EngineError::rate_limited("429 Too Many Requests")),
    );
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("hi"))).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], OutputEvent::Error { .. }));
    assert_eq!(engine.chat_models().len(), 1);
}
