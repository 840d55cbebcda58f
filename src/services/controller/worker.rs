//! Session Worker
//!
//! Runs on the blocking pool and consumes the engine's chunk iterator one
//! chunk at a time. Every decision is posted to the `EventSink` in order.
//!
//! Per chunk:
//! - assistant code opens or extends a code block (block limit enforced)
//! - console start finalizes the pending code block, then announces the run
//! - console output is kept for classification, never forwarded
//! - console end announces the result and runs completion checks
//! - assistant text goes through the payload extractor; a resolved command
//!   executes here, everything else is forwarded unless it is payload noise
//!
//! Any guard that fires posts one `Error`, sets the stop flag and resets the
//! engine. The loop checks the stop flag (and the caller's cancel flag)
//! before pulling the next chunk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;

use interpreter_bridge_core::error::BridgeError;
use interpreter_bridge_core::locale::Locale;
use interpreter_bridge_core::request::ExecutionRequest;
use interpreter_bridge_core::streaming::{ConsolePhase, OutputEvent, StreamChunk};
use interpreter_bridge_core::text::{title_case, truncate_chars};
use interpreter_bridge_llm::engine::{DisplaySink, ExecutionEngine, ScopedModel, ScopedSystemPrompt};
use interpreter_bridge_llm::error::{EngineError, EngineResult};
use interpreter_bridge_llm::quota::QuotaSignal;
use interpreter_bridge_tools::capability::CapabilityRegistry;
use interpreter_bridge_tools::command::{ExecutionIntent, ScriptLanguage, StructuredCommand};
use interpreter_bridge_tools::fingerprint::{fingerprint, Fingerprints};
use interpreter_bridge_tools::noise::{is_noisy_execution_text, sanitize_error_text};
use interpreter_bridge_tools::payload::{Extraction, FinishOutcome, PayloadExtractor};
use interpreter_bridge_tools::runner::CommandRunner;
use interpreter_bridge_tools::summary::summarize;

use super::events::EventSink;
use super::session::SessionState;
use crate::models::settings::ControllerSettings;
use crate::services::completion::CompletionVerdict;
use crate::services::fallback::FallbackCoordinator;
use crate::services::prompt::{compose_message, effective_system_prompt};

const CODE_PREVIEW_CHARS: usize = 240;

const AUTO_STOP_EN: &str = "✅ Auto-stopped after a successful result.";
const AUTO_STOP_AR: &str = "✅ تم الإيقاف تلقائياً بعد نتيجة ناجحة.";

const UNPARSEABLE_EN: &str = "Could not parse execution command. Please rephrase your request.";
const UNPARSEABLE_AR: &str = "تعذر تفسير أمر التنفيذ. أعد صياغة الطلب بشكل مباشر.";

/// What to do with a text chunk after payload tracking.
enum TextDecision {
    Forward,
    Suppress,
    /// A command ran or a guard fired; stop handling this chunk
    Halted,
}

fn tool_labels(language: ScriptLanguage, locale: Locale) -> (&'static str, &'static str) {
    match language {
        ScriptLanguage::PowerShell => (
            locale.pick("Running PowerShell...", "جاري تنفيذ أمر PowerShell..."),
            locale.pick("PowerShell execution completed", "اكتمل تنفيذ أمر PowerShell"),
        ),
        ScriptLanguage::Python => (
            locale.pick("Running Python command...", "جاري تنفيذ أمر Python..."),
            locale.pick("Python command completed", "اكتمل تنفيذ أمر Python"),
        ),
    }
}

pub struct SessionWorker<'a> {
    engine: &'a dyn ExecutionEngine,
    runner: &'a dyn CommandRunner,
    registry: &'a CapabilityRegistry,
    settings: &'a ControllerSettings,
    sink: &'a EventSink,
    cancel: &'a AtomicBool,
    quota: Arc<QuotaSignal>,
    locale: Locale,
    state: SessionState,
}

impl<'a> SessionWorker<'a> {
    pub fn new(
        engine: &'a dyn ExecutionEngine,
        runner: &'a dyn CommandRunner,
        registry: &'a CapabilityRegistry,
        settings: &'a ControllerSettings,
        sink: &'a EventSink,
        cancel: &'a AtomicBool,
        locale: Locale,
    ) -> Self {
        Self {
            engine,
            runner,
            registry,
            settings,
            sink,
            cancel,
            quota: Arc::new(QuotaSignal::new()),
            locale,
            state: SessionState::new(settings),
        }
    }

    /// Serve one request to completion.
    pub fn run(mut self, request: &ExecutionRequest) {
        let system_prompt = effective_system_prompt(request.system_prompt.as_deref());
        let _prompt = ScopedSystemPrompt::prepend(self.engine, &system_prompt);
        let message = compose_message(
            &request.message,
            &request.history,
            self.settings.history_limit,
            self.settings.history_entry_chars,
        );

        let runtime_model = self.engine.model();
        let provider = self.settings.resolved_provider(&runtime_model);
        let model = self.settings.resolved_model(&runtime_model);
        tracing::info!(provider = %provider, model = %model, "Serving request");

        if let Err(err) = self.primary_pass(&message) {
            self.absorb_engine_error(&err);
        }
        self.fallback_pass(&message, &provider, &model, &runtime_model);

        if self.quota.is_detected() {
            let error = self.state.fallback.quota_error(&provider, &model);
            tracing::warn!(kind = error.kind(), "{}", error);
            self.sink.error(error.user_message(self.locale));
        }
    }

    fn should_halt(&self) -> bool {
        self.state.stop_requested || self.cancel.load(Ordering::SeqCst)
    }

    fn primary_pass(&mut self, message: &str) -> EngineResult<()> {
        let engine = self.engine;
        let display: Arc<dyn DisplaySink> = self.quota.clone();
        let chunks = engine.chat(message, display)?;

        for item in chunks {
            if self.should_halt() {
                break;
            }
            let Some(chunk) = StreamChunk::decode(item?) else {
                continue;
            };
            self.handle_chunk(chunk);
            if self.should_halt() {
                break;
            }
        }

        self.finish_stream();
        Ok(())
    }

    fn handle_chunk(&mut self, chunk: StreamChunk) {
        match chunk {
            StreamChunk::ConsoleEvent { phase, text } => self.on_console(phase, &text),
            StreamChunk::CodeDelta { text, language } => self.on_code(&text, language),
            StreamChunk::TextDelta { text } => self.on_text(&text),
        }
    }

    fn on_console(&mut self, phase: ConsolePhase, text: &str) {
        match phase {
            ConsolePhase::Start => {
                if !self.finalize_code_block() {
                    return;
                }
                self.state.completion.begin_console();
                if self.state.shown_running {
                    return;
                }
                if let Some(language) = self.state.current_language.as_deref() {
                    self.sink.emit(OutputEvent::ToolUse {
                        name: format!("run_{}", language),
                        label: format!("Running {}...", title_case(language)),
                        input: json!({}),
                    });
                    self.state.shown_running = true;
                }
            }
            ConsolePhase::Output => self.state.completion.record_console_output(text),
            ConsolePhase::End => {
                let language = self.state.current_language.as_deref();
                self.sink.emit(OutputEvent::ToolResult {
                    name: format!("run_{}", language.unwrap_or("code")),
                    label: format!(
                        "{} execution completed",
                        language.map(title_case).unwrap_or_else(|| "Code".to_string())
                    ),
                });

                match self.state.completion.on_console_end(self.state.guard.last()) {
                    CompletionVerdict::TooManyErrors { failures } => {
                        self.halt(BridgeError::ExecutionFailed { failures })
                    }
                    CompletionVerdict::Succeeded => self.auto_stop(),
                    CompletionVerdict::Continue => self.state.shown_running = false,
                }
            }
        }
    }

    fn on_code(&mut self, text: &str, language: String) {
        if !self.state.in_code_block {
            self.state.in_code_block = true;
            self.state.code_blocks_seen += 1;
            if self.state.code_blocks_seen > self.settings.max_code_blocks {
                self.halt(BridgeError::TooManyCodeBlocks {
                    limit: self.settings.max_code_blocks,
                });
                return;
            }
        }
        self.state.code_parts.push_str(text);
        self.state.current_language = Some(language);
    }

    fn on_text(&mut self, text: &str) {
        if !self.finalize_code_block() {
            return;
        }
        let suppress = match self.track_text(text) {
            TextDecision::Halted => return,
            TextDecision::Suppress => true,
            TextDecision::Forward => is_noisy_execution_text(text),
        };
        if !suppress {
            self.sink.message(text);
            self.state.completion.observe_text(text);
        }
        if self.state.completion.after_text() == CompletionVerdict::Succeeded {
            self.auto_stop();
        }
    }

    /// Payload extraction, fence counting and repeat tracking for one text chunk.
    fn track_text(&mut self, text: &str) -> TextDecision {
        match self.state.extractor.observe(text) {
            Extraction::Intent(ExecutionIntent::StructuredCommand(command)) => {
                self.execute_structured(command);
                TextDecision::Halted
            }
            Extraction::UnsupportedLanguage(language) => {
                self.halt(BridgeError::UnsupportedLanguage { language });
                TextDecision::Halted
            }
            Extraction::Suppressed => TextDecision::Suppress,
            Extraction::Intent(ExecutionIntent::PlainText { .. }) => {
                self.state.fence_markers_seen += text.matches("```").count();
                let limit = self.settings.fence_limit();
                if self.state.fence_markers_seen > limit {
                    self.halt(BridgeError::TooManyFences { limit });
                    return TextDecision::Halted;
                }

                let fingerprints = fingerprint(text, false);
                if let Some(fp) = self.state.guard.track(&fingerprints) {
                    self.halt(BridgeError::repeated(fp));
                    return TextDecision::Halted;
                }
                TextDecision::Forward
            }
        }
    }

    /// Close the pending code block. Returns false when the request stopped.
    fn finalize_code_block(&mut self) -> bool {
        let Some(command) = self.state.take_code_block() else {
            return true;
        };
        if command.is_empty() {
            self.state.guard.set_last(Fingerprints::new());
            return true;
        }

        if let Some(structured) = PayloadExtractor::extract_from_code_block(&command) {
            self.execute_structured(structured);
            return false;
        }

        let fingerprints = fingerprint(&command, true);
        self.state.guard.set_last(fingerprints.clone());
        if let Some(fp) = self.state.guard.track(&fingerprints) {
            self.halt(BridgeError::repeated(fp));
            return false;
        }
        true
    }

    /// Run one structured command. Always stops the request afterwards.
    fn execute_structured(&mut self, command: StructuredCommand) {
        if self.state.structured_done {
            self.halt(BridgeError::RepeatedPayload);
            return;
        }

        let fingerprints = match command.language {
            ScriptLanguage::PowerShell => {
                let fingerprints = fingerprint(&command.code, false);
                if let Err(denied) = self.registry.check(&fingerprints) {
                    self.halt(BridgeError::UnsafeCommand {
                        fingerprints: denied,
                    });
                    return;
                }
                fingerprints
            }
            ScriptLanguage::Python => fingerprint(&command.code, true),
        };
        if let Some(fp) = self.state.guard.track(&fingerprints) {
            self.halt(BridgeError::repeated(fp));
            return;
        }
        if command.language == ScriptLanguage::PowerShell {
            self.state.guard.set_last(fingerprints);
        }

        tracing::info!(
            language = command.language.display_name(),
            source = command.source.as_str(),
            "Executing structured command"
        );
        let name = command.language.tool_name();
        let (running, completed) = tool_labels(command.language, self.locale);
        self.sink.emit(OutputEvent::ToolUse {
            name: name.to_string(),
            label: running.to_string(),
            input: json!({
                "code": truncate_chars(&command.code, CODE_PREVIEW_CHARS),
                "source": command.source.as_str(),
            }),
        });
        let output = self.runner.run(command.language, &command.code);
        self.sink.emit(OutputEvent::ToolResult {
            name: name.to_string(),
            label: completed.to_string(),
        });

        let summary = summarize(&command.code, &output, self.locale);
        if !summary.is_empty() {
            self.sink.message(summary);
        }

        self.state.extractor.clear();
        self.state.structured_done = true;
        self.request_stop();
    }

    /// End-of-stream salvage of a leftover payload buffer, then the last code block.
    fn finish_stream(&mut self) {
        if !self.should_halt()
            && !self.state.extractor.buffer().is_empty()
            && !self.state.structured_done
        {
            match self.state.extractor.finish() {
                FinishOutcome::Resolved(command) => self.execute_structured(command),
                FinishOutcome::Unparseable => {
                    tracing::debug!("Leftover payload buffer could not be salvaged");
                    self.sink
                        .message(self.locale.pick(UNPARSEABLE_EN, UNPARSEABLE_AR));
                }
                FinishOutcome::Empty => {}
            }
        }
        if !self.should_halt() {
            self.finalize_code_block();
        }
    }

    fn fallback_pass(&mut self, message: &str, provider: &str, model: &str, runtime_model: &str) {
        if self.cancel.load(Ordering::SeqCst)
            || !self.state.fallback.should_fallback(provider, &self.quota)
        {
            return;
        }

        self.state.fallback.mark_attempted();
        self.state.stop_requested = false;
        self.quota.clear();

        let target = self.state.fallback.runtime_model(runtime_model);
        tracing::info!(
            provider = %provider,
            from_model = %model,
            to_model = %target,
            "Quota exhausted, retrying once with fallback model"
        );
        self.sink
            .emit(self.state.fallback.status_event(provider, model));
        self.sink
            .message(self.state.fallback.retry_notice(provider, self.locale));

        let _model = ScopedModel::swap(self.engine, target);
        if let Err(err) = self.replay(message) {
            self.absorb_engine_error(&err);
        }
    }

    /// Fallback replay: relay assistant prose only.
    fn replay(&mut self, message: &str) -> EngineResult<()> {
        let engine = self.engine;
        let chunks = engine.chat(message, self.quota.clone())?;
        for item in chunks {
            if self.should_halt() {
                break;
            }
            if let Some(text) = FallbackCoordinator::relay_text(item?) {
                self.sink.message(text);
            }
        }
        Ok(())
    }

    /// Quota failures are remembered for the fallback; anything else is
    /// reported once as a sanitized agent error.
    fn absorb_engine_error(&mut self, err: &EngineError) {
        if err.is_quota_or_rate_limit() {
            tracing::warn!(error = %err, "Provider quota or rate limit reported");
            self.quota.mark(err.message());
            return;
        }
        tracing::warn!(error = %err, "Engine failed");
        let error = BridgeError::agent(sanitize_error_text(err.message()));
        self.sink.error(error.user_message(self.locale));
    }

    fn request_stop(&mut self) {
        self.state.stop_requested = true;
        self.engine.reset();
    }

    fn halt(&mut self, error: BridgeError) {
        tracing::warn!(kind = error.kind(), "Stopping request: {}", error);
        self.sink.error(error.user_message(self.locale));
        self.request_stop();
    }

    fn auto_stop(&mut self) {
        tracing::info!("Auto-stopping after a successful result");
        self.sink.message(self.locale.pick(AUTO_STOP_EN, AUTO_STOP_AR));
        self.request_stop();
    }
}
