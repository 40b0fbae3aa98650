//! Events delivered from background work to the interactive context.

use uuid::Uuid;

use captionlink_protocol::{Caption, Endpoint};

use crate::error::{ErrorKind, TransferError};
use crate::probe::ProbeReport;
use crate::state::SessionState;

/// Which input controls the UI should enable.
///
/// `send` reflects only the connection side; the UI still needs an image
/// selected before the button does anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub capture: bool,
    pub pick: bool,
    pub connect: bool,
    pub send: bool,
}

impl Controls {
    /// Nothing can be triggered while a transfer is in flight.
    pub const TRANSFERRING: Controls = Controls {
        capture: false,
        pick: false,
        connect: false,
        send: false,
    };

    /// Image selection stays available while a probe runs.
    pub const PROBING: Controls = Controls {
        capture: true,
        pick: true,
        connect: false,
        send: false,
    };

    /// After a transfer ends: choose a new image before sending again.
    pub const READY_FOR_IMAGE: Controls = Controls {
        capture: true,
        pick: true,
        connect: true,
        send: false,
    };

    /// After a successful probe.
    pub const CONNECTED: Controls = Controls {
        capture: true,
        pick: true,
        connect: true,
        send: true,
    };
}

/// Terminal result of a session, in a form that can be cloned to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded(Caption),
    Failed { kind: ErrorKind, message: String },
}

impl From<&Result<Caption, TransferError>> for Outcome {
    fn from(result: &Result<Caption, TransferError>) -> Self {
        match result {
            Ok(caption) => Self::Succeeded(caption.clone()),
            Err(e) => Self::Failed {
                kind: e.kind(),
                message: e.user_message(),
            },
        }
    }
}

/// Events emitted by the [`TransferController`](crate::TransferController).
#[derive(Debug, Clone)]
pub enum TransferEvent {
    ProbeStarted {
        endpoint: Endpoint,
    },
    ProbeSucceeded(ProbeReport),
    ProbeFailed {
        endpoint: Endpoint,
        kind: ErrorKind,
        message: String,
    },
    SessionStarted {
        session_id: Uuid,
        endpoint: Endpoint,
        payload_len: usize,
    },
    StateChanged {
        session_id: Uuid,
        state: SessionState,
    },
    /// Emitted exactly once per session, after its terminal transition.
    Completed {
        session_id: Uuid,
        outcome: Outcome,
    },
    ControlsChanged(Controls),
}
