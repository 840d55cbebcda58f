//! Admission Gate
//!
//! Single-flight admission for one controller instance. A request waits for
//! the only permit in short polls; between polls it reports
//! `waiting_for_backend_slot` at most once per heartbeat interval and gives
//! up once the hard wait cap is reached.
//!
//! The permit is an owned semaphore permit, so it is released exactly once
//! on whatever path drops it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

use interpreter_bridge_core::error::BridgeError;
use interpreter_bridge_core::streaming::OutputEvent;

use crate::models::settings::ControllerSettings;

/// Status label emitted while queued.
pub const WAITING_STATUS: &str = "waiting_for_backend_slot";

/// Why admission did not happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// Waited past the cap
    TimedOut(BridgeError),
    /// The caller went away while queued
    Abandoned,
}

/// Held for the lifetime of one admitted request.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    waited: Duration,
}

impl AdmissionPermit {
    /// Time spent queued before admission.
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

/// Binary semaphore with queued-wait heartbeats and a hard wait cap.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    wait_cap: Duration,
    poll: Duration,
    heartbeat: Duration,
}

impl AdmissionGate {
    pub fn new(settings: &ControllerSettings) -> Self {
        Self::with_timing(
            settings.queue_wait_cap(),
            settings.queue_poll(),
            settings.queue_heartbeat(),
        )
    }

    pub fn with_timing(wait_cap: Duration, poll: Duration, heartbeat: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            wait_cap,
            poll,
            heartbeat,
        }
    }

    /// Returns true while a request holds the slot.
    pub fn is_busy(&self) -> bool {
        self.semaphore.available_permits() == 0
    }

    /// Wait for the slot. Heartbeats go to `status_tx`; the first one is
    /// sent at the first poll timeout.
    pub async fn acquire(
        &self,
        status_tx: &mpsc::Sender<OutputEvent>,
    ) -> Result<AdmissionPermit, AdmissionError> {
        let started = Instant::now();
        let mut last_heartbeat: Option<Instant> = None;

        let acquire = self.semaphore.clone().acquire_owned();
        tokio::pin!(acquire);

        loop {
            tokio::select! {
                permit = &mut acquire => {
                    let permit = permit.map_err(|_| AdmissionError::Abandoned)?;
                    let waited = started.elapsed();
                    if waited >= self.poll {
                        tracing::debug!(waited_ms = waited.as_millis() as u64, "Admitted after queueing");
                    }
                    return Ok(AdmissionPermit { _permit: permit, waited });
                }
                _ = tokio::time::sleep(self.poll) => {
                    let waited = started.elapsed();
                    if waited >= self.wait_cap {
                        tracing::warn!(
                            waited_ms = waited.as_millis() as u64,
                            cap_ms = self.wait_cap.as_millis() as u64,
                            "Admission wait exceeded cap"
                        );
                        return Err(AdmissionError::TimedOut(BridgeError::QueueTimeout {
                            waited_ms: waited.as_millis() as u64,
                        }));
                    }
                    if status_tx.is_closed() {
                        tracing::debug!("Caller left while queued");
                        return Err(AdmissionError::Abandoned);
                    }

                    let due = last_heartbeat.map_or(true, |at| at.elapsed() >= self.heartbeat);
                    if due {
                        last_heartbeat = Some(Instant::now());
                        let status = OutputEvent::status(
                            WAITING_STATUS,
                            json!({
                                "wait_seconds": waited.as_secs(),
                                "wait_cap_seconds": self.wait_cap.as_secs(),
                            }),
                        );
                        if status_tx.send(status).await.is_err() {
                            return Err(AdmissionError::Abandoned);
                        }
                    }
                }
            }
        }
    }
}
