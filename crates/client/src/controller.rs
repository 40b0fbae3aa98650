//! Session controller: owns the single session slot, the last probe result,
//! and the event channel back to the interactive context.
//!
//! Each probe or send runs as its own tokio task. Results come back as
//! [`TransferEvent`]s on the channel returned by
//! [`take_events`](TransferController::take_events).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use captionlink_protocol::{Endpoint, ImagePayload};

use crate::config::ClientConfig;
use crate::error::{InputError, TransferError};
use crate::events::{Controls, Outcome, TransferEvent};
use crate::probe::{ProbeReport, probe};
use crate::session::{SessionReport, TransferSession};

/// The session currently holding the slot.
#[derive(Debug)]
struct ActiveSession {
    id: Uuid,
    cancel: CancellationToken,
}

type Slot = Arc<Mutex<Option<ActiveSession>>>;

/// Releases the session slot when the session task ends, on every path.
struct SlotGuard {
    slot: Slot,
    id: Uuid,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|a| a.id == self.id) {
            *slot = None;
        }
    }
}

/// Clears the probe-in-flight flag on drop.
struct ProbeGuard(Arc<AtomicBool>);

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle to a running transfer session.
#[derive(Debug)]
pub struct SessionHandle {
    id: Uuid,
    cancel: CancellationToken,
    join: JoinHandle<SessionReport>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Aborts the session at its next blocking step.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the session to reach a terminal state.
    pub async fn wait(self) -> Result<SessionReport, JoinError> {
        self.join.await
    }
}

/// Drives probes and transfers for one client instance.
///
/// At most one transfer session runs at a time: a second
/// [`send`](Self::send) while one is in flight fails with
/// [`TransferError::Busy`]. The same holds for probes, independently.
pub struct TransferController {
    config: ClientConfig,
    slot: Slot,
    probing: Arc<AtomicBool>,
    last_probe: Arc<Mutex<Option<ProbeReport>>>,
    events_tx: mpsc::UnboundedSender<TransferEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<TransferEvent>>>,
    root_cancel: CancellationToken,
}

impl TransferController {
    pub fn new(config: ClientConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            slot: Arc::new(Mutex::new(None)),
            probing: Arc::new(AtomicBool::new(false)),
            last_probe: Arc::new(Mutex::new(None)),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            root_cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransferEvent>> {
        self.events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// True while a transfer session holds the slot.
    pub fn is_busy(&self) -> bool {
        session_active(&self.slot)
    }

    pub fn active_session(&self) -> Option<Uuid> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|a| a.id)
    }

    /// Result of the most recent successful probe, if any.
    pub fn last_probe(&self) -> Option<ProbeReport> {
        self.last_probe
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drops the stored probe, e.g. after the user edits the endpoint.
    pub fn forget_probe(&self) {
        *self
            .last_probe
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Starts a connectivity probe in the background.
    ///
    /// On success the report is stored for later sends; on failure any
    /// stored report is cleared and sending is disabled.
    pub fn probe(
        &self,
        endpoint: Endpoint,
    ) -> Result<JoinHandle<Result<ProbeReport, TransferError>>, TransferError> {
        if self.root_cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        if self.probing.swap(true, Ordering::AcqRel) {
            return Err(TransferError::Busy);
        }
        let flag = ProbeGuard(self.probing.clone());

        let events = self.events_tx.clone();
        let slot = self.slot.clone();
        let last_probe = self.last_probe.clone();
        let cancel = self.root_cancel.child_token();
        let timeout = self.config.probe_timeout();

        info!(%endpoint, "probing endpoint");
        emit(&events, TransferEvent::ProbeStarted {
            endpoint: endpoint.clone(),
        });
        if !session_active(&slot) {
            emit(&events, TransferEvent::ControlsChanged(Controls::PROBING));
        }

        Ok(tokio::spawn(async move {
            let _flag = flag;
            let result = probe(&endpoint, timeout, &cancel).await;

            let mut stored = last_probe.lock().unwrap_or_else(PoisonError::into_inner);
            let (event, controls) = match &result {
                Ok(report) => {
                    *stored = Some(report.clone());
                    (TransferEvent::ProbeSucceeded(report.clone()), Controls::CONNECTED)
                }
                Err(e) => {
                    warn!(%endpoint, error = %e, "probe failed");
                    *stored = None;
                    (
                        TransferEvent::ProbeFailed {
                            endpoint: endpoint.clone(),
                            kind: e.kind(),
                            message: e.user_message(),
                        },
                        Controls::READY_FOR_IMAGE,
                    )
                }
            };
            drop(stored);

            emit(&events, event);
            if !session_active(&slot) {
                emit(&events, TransferEvent::ControlsChanged(controls));
            }
            result
        }))
    }

    /// Sends `payload` to the endpoint of the stored probe.
    ///
    /// Without a fresh probe this fails with an input error, unless
    /// `require_probe` is off, in which case the configured endpoint is
    /// used.
    pub fn send(&self, payload: ImagePayload) -> Result<SessionHandle, TransferError> {
        let endpoint = self.resolve_endpoint()?;
        self.start_session(endpoint, payload)
    }

    /// Sends `payload` to the endpoint of an explicitly supplied probe.
    pub fn send_to(
        &self,
        probe: &ProbeReport,
        payload: ImagePayload,
    ) -> Result<SessionHandle, TransferError> {
        self.check_fresh(probe)?;
        self.start_session(probe.endpoint.clone(), payload)
    }

    /// Cancels the active session, if any. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(active) => {
                debug!(session = %active.id, "cancelling session");
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels all in-flight work and refuses new work.
    pub fn shutdown(&self) {
        info!("transfer controller shutting down");
        self.root_cancel.cancel();
    }

    fn resolve_endpoint(&self) -> Result<Endpoint, TransferError> {
        let max_age = self.config.probe_max_age();
        match self.last_probe() {
            Some(p) if p.is_fresh(max_age) => Ok(p.endpoint),
            Some(_) if self.config.require_probe => Err(InputError::StaleProbe {
                max_age_secs: max_age.as_secs(),
            }
            .into()),
            None if self.config.require_probe => Err(InputError::NotConnected.into()),
            _ => Ok(self.config.endpoint().map_err(InputError::from)?),
        }
    }

    fn check_fresh(&self, probe: &ProbeReport) -> Result<(), TransferError> {
        let max_age = self.config.probe_max_age();
        if !probe.is_fresh(max_age) {
            return Err(InputError::StaleProbe {
                max_age_secs: max_age.as_secs(),
            }
            .into());
        }
        Ok(())
    }

    fn start_session(
        &self,
        endpoint: Endpoint,
        payload: ImagePayload,
    ) -> Result<SessionHandle, TransferError> {
        if self.root_cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        if payload.is_empty() {
            return Err(InputError::NoPayload.into());
        }

        let cancel = self.root_cancel.child_token();
        let session = TransferSession::new(endpoint.clone(), payload);
        let id = session.id();
        let payload_len = session.payload_len();

        {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(active) = slot.as_ref() {
                debug!(active = %active.id, "send rejected, session in flight");
                return Err(TransferError::Busy);
            }
            *slot = Some(ActiveSession {
                id,
                cancel: cancel.clone(),
            });
        }
        let guard = SlotGuard {
            slot: self.slot.clone(),
            id,
        };

        info!(session = %id, %endpoint, payload_len, "starting transfer");
        emit(&self.events_tx, TransferEvent::SessionStarted {
            session_id: id,
            endpoint,
            payload_len,
        });
        emit(&self.events_tx, TransferEvent::ControlsChanged(Controls::TRANSFERRING));

        let events = self.events_tx.clone();
        let config = self.config.clone();
        let task_cancel = cancel.clone();
        let join = tokio::spawn(async move {
            let state_events = events.clone();
            let report = session
                .run(&config, task_cancel, move |session_id, state| {
                    emit(&state_events, TransferEvent::StateChanged { session_id, state });
                })
                .await;

            // Free the slot before the UI hears about completion so an
            // immediate follow-up send is accepted.
            drop(guard);

            emit(&events, TransferEvent::Completed {
                session_id: report.id,
                outcome: Outcome::from(&report.outcome),
            });
            emit(&events, TransferEvent::ControlsChanged(Controls::READY_FOR_IMAGE));
            report
        });

        Ok(SessionHandle { id, cancel, join })
    }
}

impl Drop for TransferController {
    fn drop(&mut self) {
        self.root_cancel.cancel();
    }
}

fn session_active(slot: &Mutex<Option<ActiveSession>>) -> bool {
    slot.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

fn emit(tx: &mpsc::UnboundedSender<TransferEvent>, event: TransferEvent) {
    if tx.send(event).is_err() {
        trace!("event receiver dropped");
    }
}
