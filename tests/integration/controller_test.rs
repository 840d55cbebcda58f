//! Controller Integration Tests
//!
//! End-to-end runs through `InterpreterController::run` with a scripted
//! engine and a recording runner.

use std::sync::Arc;

use serde_json::json;

use interpreter_bridge::{
    ControllerSettings, ExecutionEngine, ExecutionRequest, HistoryEntry, OutputEvent,
};
use interpreter_bridge_tools::ScriptLanguage;

use super::support::*;

const NOTEPAD_PAYLOAD: &str =
    r#"{"name": "execute", "arguments": {"language": "powershell", "code": "Start-Process notepad.exe"}}"#;

// ============================================================================
// Forwarding
// ============================================================================

#[tokio::test]
async fn test_plain_text_forwarded_verbatim() {
    let engine = Arc::new(ScriptedEngine::new("gpt-4o").turn(vec![
        message("Hello! What would you like me to open?"),
        text(" I can launch apps."),
    ]));
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("hi"))).await;

    assert_eq!(
        events,
        vec![
            OutputEvent::message("Hello! What would you like me to open?"),
            OutputEvent::message(" I can launch apps."),
        ]
    );
    assert!(runner.calls().is_empty());
    assert!(!controller.is_busy());
}

#[tokio::test]
async fn test_system_prompt_prepended_and_restored() {
    let engine = Arc::new(ScriptedEngine::new("gpt-4o").turn(vec![message("Sure.")]));
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let request = ExecutionRequest::new("open calculator")
        .with_system_prompt("Be brief.")
        .with_history(vec![
            HistoryEntry::user("what time is it"),
            HistoryEntry::assistant("It is noon."),
        ]);
    collect(controller.run(request)).await;

    let prompts = engine.chat_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].starts_with("Be brief.\n\nExecution guardrails:"));
    assert!(prompts[0].ends_with("\n\nYou are a desktop assistant."));
    assert_eq!(engine.system_prompt(), "You are a desktop assistant.");

    let messages = engine.chat_messages();
    assert_eq!(
        messages[0],
        "[Recent conversation context]\nUser: what time is it\nAssistant: It is noon.\n[End of context]\nopen calculator"
    );
}

#[tokio::test]
async fn test_payload_fragments_never_forwarded() {
    let engine = Arc::new(ScriptedEngine::new("gpt-4o").turn(vec![
        message("Opening it now."),
        message(r#"{"name": "execute", "arguments": {"#),
    ]));
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("open notepad"))).await;

    assert_eq!(
        events,
        vec![
            OutputEvent::message("Opening it now."),
            OutputEvent::message("Could not parse execution command. Please rephrase your request."),
        ]
    );
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_arabic_request_gets_arabic_notices() {
    let engine = Arc::new(
        ScriptedEngine::new("gpt-4o").turn(vec![message(r#"{"name": "execute", "arguments": {"#)]),
    );
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("افتح المفكرة"))).await;

    assert_eq!(
        events,
        vec![OutputEvent::message(
            "تعذر تفسير أمر التنفيذ. أعد صياغة الطلب بشكل مباشر."
        )]
    );
}

// ============================================================================
// Structured execution
// ============================================================================

#[tokio::test]
async fn test_structured_payload_runs_once_and_stops() {
    let engine = Arc::new(ScriptedEngine::new("gpt-4o").turn(vec![
        message(NOTEPAD_PAYLOAD),
        message(NOTEPAD_PAYLOAD),
        message("Notepad is open."),
    ]));
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("open notepad"))).await;

    assert_eq!(
        events,
        vec![
            OutputEvent::ToolUse {
                name: "run_powershell".to_string(),
                label: "Running PowerShell...".to_string(),
                input: json!({
                    "code": "Start-Process notepad.exe",
                    "source": "structured_payload",
                }),
            },
            OutputEvent::ToolResult {
                name: "run_powershell".to_string(),
                label: "PowerShell execution completed".to_string(),
            },
            OutputEvent::message("Application launched: notepad.exe\nPath: notepad.exe"),
        ]
    );
    assert_eq!(
        runner.calls(),
        vec![(ScriptLanguage::PowerShell, "Start-Process notepad.exe".to_string())]
    );
    assert_eq!(engine.pulled(), 1);
    assert!(engine.resets() >= 1);
}

#[tokio::test]
async fn test_unsafe_payload_is_refused() {
    let payload = r#"{"name": "execute", "arguments": {"language": "powershell", "code": "Stop-Process -Name explorer | Out-Null"}}"#;
    let engine = Arc::new(ScriptedEngine::new("gpt-4o").turn(vec![message(payload)]));
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("close explorer"))).await;

    assert_eq!(
        events,
        vec![OutputEvent::error(
            "Stopped structured execute payload: command not in safe allowlist."
        )]
    );
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_unsupported_payload_language() {
    let payload = r#"{"name": "execute", "arguments": {"language": "ruby", "code": "puts 1"}}"#;
    let engine = Arc::new(ScriptedEngine::new("gpt-4o").turn(vec![message(payload)]));
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("run it"))).await;

    assert_eq!(
        events,
        vec![OutputEvent::error(
            "Stopped structured execute payload: unsupported language 'ruby'."
        )]
    );
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_summary_echoing_payload_is_withheld() {
    let payload = r#"{"name": "execute", "arguments": {"language": "powershell", "code": "Get-Process"}}"#;
    let engine = Arc::new(ScriptedEngine::new("gpt-4o").turn(vec![message(payload)]));
    let runner = Arc::new(RecordingRunner::new(
        r#"{"name": "execute", "arguments": {"language": "powershell", "code": "Stop-Process -Name x"}}"#,
    ));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("list processes"))).await;

    assert_eq!(runner.calls().len(), 1);
    assert_eq!(tool_uses(&events), 1);
    assert!(
        events.iter().all(|e| !matches!(e, OutputEvent::Message { .. })),
        "echoed payload reached the caller: {:?}",
        events
    );
    assert!(matches!(events.last(), Some(OutputEvent::ToolResult { .. })));
}

// ============================================================================
// Runaway guards
// ============================================================================

#[tokio::test]
async fn test_repeated_get_process_executes_once() {
    let mut steps = Vec::new();
    for _ in 0..3 {
        steps.push(code("powershell", "Get-Process | Select-Object -First 5"));
        steps.push(console_start());
        steps.push(console_output("ok"));
        steps.push(console_end());
    }
    let engine = Arc::new(ScriptedEngine::new("gpt-4o").turn(steps));
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("show processes"))).await;

    assert_eq!(tool_uses(&events), 1);
    assert_eq!(
        events.last(),
        Some(&OutputEvent::error(
            "Stopped repeated execution: duplicate command pattern detected (`get-process`)."
        ))
    );
    // second block's console start is the last chunk consumed
    assert_eq!(engine.pulled(), 6);
}

#[tokio::test]
async fn test_code_block_limit_halts_at_max() {
    let mut steps = Vec::new();
    for i in 0..4 {
        steps.push(code("python", &format!("x = {}", i)));
        steps.push(console_start());
        steps.push(console_output(&i.to_string()));
        steps.push(console_end());
    }
    let engine = Arc::new(ScriptedEngine::new("gpt-4o").turn(steps));
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("count"))).await;

    assert_eq!(tool_uses(&events), 3);
    assert_eq!(
        errors(&events),
        vec!["Stopped execution after reaching the limit of 3 code blocks for this message."]
    );
    assert!(matches!(events.last(), Some(OutputEvent::Error { .. })));
}

#[tokio::test]
async fn test_execution_errors_stop_after_retry_budget() {
    let mut steps = Vec::new();
    for command in ["Get-Foo", "Get-Bar"] {
        steps.push(code("powershell", command));
        steps.push(console_start());
        steps.push(console_output("The term 'x' is not recognized as the name of a cmdlet"));
        steps.push(console_end());
    }
    steps.push(message("Let me try again."));
    let engine = Arc::new(ScriptedEngine::new("gpt-4o").turn(steps));
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("do something"))).await;

    assert_eq!(tool_uses(&events), 2);
    assert_eq!(
        errors(&events),
        vec!["Stopped after repeated execution errors (retry limit reached)."]
    );
    assert_eq!(engine.pulled(), 8);
}

// ============================================================================
// Auto-stop
// ============================================================================

#[tokio::test]
async fn test_process_table_auto_stops() {
    let engine = Arc::new(ScriptedEngine::new("gpt-4o").turn(vec![
        code("powershell", "Get-Process | Sort-Object CPU -Descending | Select-Object -First 5"),
        console_start(),
        console_output("ProcessName    Id  WorkingSet\nchrome       1234  99999"),
        console_end(),
        message("Here are the top processes."),
    ]));
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("top processes"))).await;

    assert_eq!(
        events,
        vec![
            OutputEvent::ToolUse {
                name: "run_powershell".to_string(),
                label: "Running Powershell...".to_string(),
                input: json!({}),
            },
            OutputEvent::ToolResult {
                name: "run_powershell".to_string(),
                label: "Powershell execution completed".to_string(),
            },
            OutputEvent::message("✅ Auto-stopped after a successful result."),
        ]
    );
    assert_eq!(engine.pulled(), 4);
}

#[tokio::test]
async fn test_done_phrase_after_execution_auto_stops() {
    let engine = Arc::new(ScriptedEngine::new("gpt-4o").turn(vec![
        code("python", "print(2 + 2)"),
        console_start(),
        console_output("4"),
        console_end(),
        message("The task is done."),
        message("Anything else?"),
    ]));
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("add"))).await;

    assert_eq!(
        &events[2..],
        &[
            OutputEvent::message("The task is done."),
            OutputEvent::message("✅ Auto-stopped after a successful result."),
        ]
    );
    assert_eq!(engine.pulled(), 5);
}

// ============================================================================
// Engine failures and cancellation
// ============================================================================

#[tokio::test]
async fn test_engine_failure_is_sanitized() {
    let engine = Arc::new(ScriptedEngine::new("gpt-4o").turn(vec![
        message("Working on it."),
        Step::Fail(interpreter_bridge::EngineError::stream(
            "connection reset by peer\nTraceback (most recent call last):\n  File \"x.py\"",
        )),
    ]));
    let runner = Arc::new(RecordingRunner::new(""));
    let controller = controller(&engine, &runner, ControllerSettings::default());

    let events = collect(controller.run(ExecutionRequest::new("hi"))).await;

    assert_eq!(events.len(), 2);
    let errors = errors(&events);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Agent error: "));
    assert!(!errors[0].contains("Traceback"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_ends_active_request() {
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

    controller.stop();
    let rest = collect(stream).await;

    assert!(errors(&rest).is_empty());
    assert!(engine.pulled() < 20);
    assert!(engine.resets() >= 1);
}
