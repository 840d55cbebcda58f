//! Interpreter Controller
//!
//! Public entry point. `run()` returns an asynchronous event stream for one
//! request; behind it a driver task waits for admission, starts a blocking
//! session worker and bridges the worker's events to the caller.
//!
//! ## Bridge
//!
//! ```text
//! caller <- ReceiverStream <- driver task <- unbounded channel <- SessionWorker (spawn_blocking)
//!                               |
//!                               +-- backend_processing heartbeat when the worker is quiet
//! ```
//!
//! The worker always finishes with a completion sentinel sent from a drop
//! guard. The admission permit is held by the driver and released only after
//! the worker has returned, so the engine's scoped model and system prompt
//! are restored before the next request is admitted.

pub mod events;
pub mod session;
pub mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

use interpreter_bridge_core::error::BridgeError;
use interpreter_bridge_core::locale::Locale;
use interpreter_bridge_core::request::ExecutionRequest;
use interpreter_bridge_core::streaming::OutputEvent;
use interpreter_bridge_llm::engine::ExecutionEngine;
use interpreter_bridge_tools::capability::CapabilityRegistry;
use interpreter_bridge_tools::runner::{CommandRunner, ShellCommandRunner};

use crate::models::settings::ControllerSettings;
use crate::services::admission::{AdmissionError, AdmissionGate};

use self::events::{BridgeMessage, EventSink};
use self::worker::SessionWorker;

/// Caller-facing event stream for one request.
pub type EventStream = ReceiverStream<OutputEvent>;

/// Status label emitted while the worker is busy without producing events.
pub const BACKEND_STATUS: &str = "backend_processing";

/// Events buffered between the driver and a slow caller.
const CALLER_BUFFER: usize = 256;

/// Caller-facing text when the session worker dies; details go to the log only.
const WORKER_FAILED: &str = "the execution worker stopped unexpectedly";

struct ControllerInner {
    engine: Arc<dyn ExecutionEngine>,
    runner: Arc<dyn CommandRunner>,
    registry: CapabilityRegistry,
    settings: ControllerSettings,
    gate: AdmissionGate,
    /// Cancel flag of the admitted request
    active: Mutex<Option<Arc<AtomicBool>>>,
}

impl ControllerInner {
    fn active(&self) -> MutexGuard<'_, Option<Arc<AtomicBool>>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_active(&self, cancel: Option<Arc<AtomicBool>>) {
        *self.active() = cancel;
    }
}

/// Streaming tool-execution controller around one execution engine.
///
/// Cheap to clone; clones share the engine and the admission slot.
#[derive(Clone)]
pub struct InterpreterController {
    inner: Arc<ControllerInner>,
}

impl InterpreterController {
    pub fn new(
        engine: Arc<dyn ExecutionEngine>,
        runner: Arc<dyn CommandRunner>,
        registry: CapabilityRegistry,
        settings: ControllerSettings,
    ) -> Self {
        let settings = settings.normalized();
        let gate = AdmissionGate::new(&settings);
        Self {
            inner: Arc::new(ControllerInner {
                engine,
                runner,
                registry,
                settings,
                gate,
                active: Mutex::new(None),
            }),
        }
    }

    /// Default settings, the Windows capability allowlist and the shell runner.
    pub fn with_defaults(engine: Arc<dyn ExecutionEngine>) -> Self {
        let settings = ControllerSettings::default();
        let runner = Arc::new(ShellCommandRunner::new(settings.command_timeout()));
        Self::new(engine, runner, CapabilityRegistry::default(), settings)
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.inner.settings
    }

    /// A request currently holds the admission slot.
    pub fn is_busy(&self) -> bool {
        self.inner.gate.is_busy()
    }

    /// Serve one request. Events arrive in decision order; the stream ends
    /// when the request is finished, stopped or rejected.
    pub fn run(&self, request: ExecutionRequest) -> EventStream {
        let (tx, rx) = mpsc::channel(CALLER_BUFFER);
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("interpreter_request", request_id = %request_id);

        let inner = self.inner.clone();
        tokio::spawn(drive(inner, request, tx).instrument(span));
        ReceiverStream::new(rx)
    }

    /// Stop the admitted request, if any. Queued requests are not affected.
    pub fn stop(&self) {
        match self.inner.active().as_ref() {
            Some(cancel) => {
                tracing::info!("Stop requested for the active request");
                cancel.store(true, Ordering::SeqCst);
            }
            None => tracing::debug!("Stop requested with no active request"),
        }
        self.inner.engine.reset();
    }
}

/// Admission, worker start and event bridging for one request.
async fn drive(inner: Arc<ControllerInner>, request: ExecutionRequest, tx: mpsc::Sender<OutputEvent>) {
    let locale = Locale::detect(&request.message);

    let permit = match inner.gate.acquire(&tx).await {
        Ok(permit) => permit,
        Err(AdmissionError::TimedOut(error)) => {
            tracing::warn!(kind = error.kind(), "{}", error);
            let _ = tx.send(OutputEvent::error(error.user_message(locale))).await;
            return;
        }
        Err(AdmissionError::Abandoned) => {
            tracing::debug!("Caller went away while queued");
            return;
        }
    };
    tracing::info!(waited_ms = permit.waited().as_millis() as u64, "Request admitted");

    let cancel = Arc::new(AtomicBool::new(false));
    inner.set_active(Some(cancel.clone()));

    let (sink, mut events) = EventSink::channel();
    let worker = {
        let inner = inner.clone();
        let cancel = cancel.clone();
        let span = tracing::Span::current();
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let _done = sink.done_guard();
            SessionWorker::new(
                inner.engine.as_ref(),
                inner.runner.as_ref(),
                &inner.registry,
                &inner.settings,
                &sink,
                &cancel,
                locale,
            )
            .run(&request);
        })
    };

    let heartbeat = inner.settings.backend_heartbeat();
    let mut caller_gone = false;
    loop {
        let event = match tokio::time::timeout(heartbeat, events.recv()).await {
            Ok(Some(BridgeMessage::Event(event))) => event,
            Ok(Some(BridgeMessage::Done)) | Ok(None) => break,
            Err(_) => OutputEvent::status(
                BACKEND_STATUS,
                json!({ "heartbeat_seconds": heartbeat.as_secs_f64() }),
            ),
        };
        if caller_gone {
            continue;
        }
        if tx.send(event).await.is_err() {
            tracing::info!("Caller dropped the event stream, stopping request");
            caller_gone = true;
            cancel.store(true, Ordering::SeqCst);
            inner.engine.reset();
        }
    }

    if let Err(err) = worker.await {
        tracing::error!(error = %err, "Session worker failed");
        inner.engine.reset();
        if !caller_gone {
            let error = BridgeError::agent(WORKER_FAILED);
            let _ = tx.send(OutputEvent::error(error.user_message(locale))).await;
        }
    }

    inner.set_active(None);
    drop(permit);
    tracing::info!("Request finished");
}
