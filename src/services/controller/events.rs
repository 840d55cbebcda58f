//! Worker-to-bridge event channel
//!
//! The blocking worker posts every decision as a `BridgeMessage::Event` on
//! an unbounded channel and finishes with exactly one `BridgeMessage::Done`,
//! sent from a drop guard so the bridge terminates even if the worker panics.
//! Message text that looks like leaked command payload never leaves the sink.

use tokio::sync::mpsc;

use interpreter_bridge_core::streaming::OutputEvent;
use interpreter_bridge_tools::noise::is_noisy_execution_text;

#[derive(Debug)]
pub enum BridgeMessage {
    Event(OutputEvent),
    /// Completion sentinel
    Done,
}

/// Sending half used by the session worker.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<BridgeMessage>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<BridgeMessage>) -> Self {
        Self { tx }
    }

    /// Create a sink and the receiver the bridge drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BridgeMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: OutputEvent) {
        if let OutputEvent::Message { text } = &event {
            if is_noisy_execution_text(text) {
                tracing::debug!(chars = text.chars().count(), "Dropping noisy message");
                return;
            }
        }
        tracing::trace!(event_type = event.event_type(), "Posting event");
        if self.tx.send(BridgeMessage::Event(event)).is_err() {
            tracing::debug!("Bridge closed, dropping event");
        }
    }

    pub fn message(&self, text: impl Into<String>) {
        self.emit(OutputEvent::message(text));
    }

    pub fn error(&self, text: impl Into<String>) {
        self.emit(OutputEvent::error(text));
    }

    /// Guard that sends the completion sentinel when dropped.
    pub fn done_guard(&self) -> DoneOnDrop {
        DoneOnDrop {
            tx: self.tx.clone(),
        }
    }
}

pub struct DoneOnDrop {
    tx: mpsc::UnboundedSender<BridgeMessage>,
}

impl Drop for DoneOnDrop {
    fn drop(&mut self) {
        let _ = self.tx.send(BridgeMessage::Done);
    }
}
