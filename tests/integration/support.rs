//! Scripted engine and recording runner shared by the integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_stream::StreamExt;

use interpreter_bridge::{
    CapabilityRegistry, ChunkRecord, CommandRunner, ControllerSettings, DisplaySink, EngineError,
    EventStream, ExecutionEngine, InterpreterController, OutputEvent, RawChunk,
};
use interpreter_bridge_llm::ChunkStream;
use interpreter_bridge_tools::ScriptLanguage;

/// One scripted step of a chat turn.
pub enum Step {
    Chunk(RawChunk),
    /// Text written to the display sink
    Display(String),
    /// Error yielded mid-stream
    Fail(EngineError),
    Sleep(Duration),
}

/// One `chat()` call.
pub enum Turn {
    Steps(Vec<Step>),
    /// `chat()` itself fails
    Refuse(EngineError),
}

pub fn text(text: &str) -> Step {
    Step::Chunk(RawChunk::Text(text.to_string()))
}

pub fn message(text: &str) -> Step {
    Step::Chunk(ChunkRecord::message(text).into())
}

pub fn code(language: &str, text: &str) -> Step {
    Step::Chunk(ChunkRecord::code(language, text).into())
}

pub fn console_start() -> Step {
    Step::Chunk(ChunkRecord::console_start().into())
}

pub fn console_output(text: &str) -> Step {
    Step::Chunk(ChunkRecord::console_output(text).into())
}

pub fn console_end() -> Step {
    Step::Chunk(ChunkRecord::console_end().into())
}

pub fn sleep_ms(ms: u64) -> Step {
    Step::Sleep(Duration::from_millis(ms))
}

/// Engine that replays scripted turns and records how it was driven.
pub struct ScriptedEngine {
    turns: Mutex<VecDeque<Turn>>,
    prompt: Mutex<String>,
    model: Mutex<String>,
    chat_models: Mutex<Vec<String>>,
    chat_prompts: Mutex<Vec<String>>,
    chat_messages: Mutex<Vec<String>>,
    pulled: AtomicUsize,
    resets: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(model: &str) -> Self {
        Self {
            turns: Mutex::new(VecDeque::new()),
            prompt: Mutex::new("You are a desktop assistant.".to_string()),
            model: Mutex::new(model.to_string()),
            chat_models: Mutex::new(Vec::new()),
            chat_prompts: Mutex::new(Vec::new()),
            chat_messages: Mutex::new(Vec::new()),
            pulled: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn turn(self, steps: Vec<Step>) -> Self {
        self.turns.lock().unwrap().push_back(Turn::Steps(steps));
        self
    }

    pub fn refuse(self, error: EngineError) -> Self {
        self.turns.lock().unwrap().push_back(Turn::Refuse(error));
        self
    }

    pub fn chat_models(&self) -> Vec<String> {
        self.chat_models.lock().unwrap().clone()
    }

    pub fn chat_prompts(&self) -> Vec<String> {
        self.chat_prompts.lock().unwrap().clone()
    }

    pub fn chat_messages(&self) -> Vec<String> {
        self.chat_messages.lock().unwrap().clone()
    }

    /// Chunks handed to the controller so far.
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    /// Most chat streams ever open at the same time.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

struct ScriptedStream<'a> {
    engine: &'a ScriptedEngine,
    steps: VecDeque<Step>,
    display: Arc<dyn DisplaySink>,
}

impl Iterator for ScriptedStream<'_> {
    type Item = Result<RawChunk, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.steps.pop_front()? {
                Step::Chunk(chunk) => {
                    self.engine.pulled.fetch_add(1, Ordering::SeqCst);
                    return Some(Ok(chunk));
                }
                Step::Display(text) => self.display.display(&text),
                Step::Fail(error) => return Some(Err(error)),
                Step::Sleep(duration) => std::thread::sleep(duration),
            }
        }
    }
}

impl Drop for ScriptedStream<'_> {
    fn drop(&mut self) {
        self.engine.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ExecutionEngine for ScriptedEngine {
    fn chat<'a>(
        &'a self,
        message: &str,
        display: Arc<dyn DisplaySink>,
    ) -> Result<ChunkStream<'a>, EngineError> {
        self.chat_models.lock().unwrap().push(self.model());
        self.chat_prompts.lock().unwrap().push(self.system_prompt());
        self.chat_messages.lock().unwrap().push(message.to_string());

        let turn = self.turns.lock().unwrap().pop_front();
        let steps = match turn {
            Some(Turn::Refuse(error)) => return Err(error),
            Some(Turn::Steps(steps)) => steps,
            None => Vec::new(),
        };

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        Ok(Box::new(ScriptedStream {
            engine: self,
            steps: steps.into(),
            display,
        }))
    }

    fn system_prompt(&self) -> String {
        self.prompt.lock().unwrap().clone()
    }

    fn set_system_prompt(&self, prompt: String) {
        *self.prompt.lock().unwrap() = prompt;
    }

    fn model(&self) -> String {
        self.model.lock().unwrap().clone()
    }

    fn set_model(&self, model: String) {
        *self.model.lock().unwrap() = model;
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Runner that records commands instead of executing them.
pub struct RecordingRunner {
    output: String,
    calls: Mutex<Vec<(ScriptLanguage, String)>>,
}

impl RecordingRunner {
    pub fn new(output: &str) -> Self {
        Self {
            output: output.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(ScriptLanguage, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, language: ScriptLanguage, code: &str) -> String {
        self.calls.lock().unwrap().push((language, code.to_string()));
        self.output.clone()
    }
}

/// Runner whose every command panics, taking the session worker down.
pub struct PanickingRunner;

impl CommandRunner for PanickingRunner {
    fn run(&self, _language: ScriptLanguage, _code: &str) -> String {
        panic!("runner exploded at C:\\secret\\path");
    }
}

/// Short queue timings so admission tests finish quickly.
pub fn fast_settings() -> ControllerSettings {
    ControllerSettings {
        queue_poll_ms: 20,
        queue_heartbeat_ms: 20,
        ..Default::default()
    }
}

pub fn controller<R: CommandRunner + 'static>(
    engine: &Arc<ScriptedEngine>,
    runner: &Arc<R>,
    settings: ControllerSettings,
) -> InterpreterController {
    InterpreterController::new(
        engine.clone(),
        runner.clone(),
        CapabilityRegistry::default(),
        settings,
    )
}

/// Drain a request's stream.
pub async fn collect(stream: EventStream) -> Vec<OutputEvent> {
    tokio::time::timeout(Duration::from_secs(10), stream.collect::<Vec<_>>())
        .await
        .expect("event stream did not finish")
}

pub fn tool_uses(events: &[OutputEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, OutputEvent::ToolUse { .. }))
        .count()
}

pub fn errors(events: &[OutputEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            OutputEvent::Error { text } => Some(text.clone()),
            _ => None,
        })
        .collect()
}
