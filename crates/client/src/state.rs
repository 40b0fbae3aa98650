//! Transfer session states.
//!
//! ```text
//! Idle -> Connecting -> AwaitingAck -> SendingPayload -> AwaitingResponse -> Succeeded
//!             |              |               |                  |
//!             +--------------+---------------+------------------+----> Failed
//! ```

use std::fmt;

use crate::error::ErrorKind;

/// State of a single transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no I/O yet.
    Idle,
    /// Opening the connection.
    Connecting,
    /// Size announced, waiting for the server's acknowledgement.
    AwaitingAck,
    /// Writing the image bytes.
    SendingPayload,
    /// Waiting for the caption.
    AwaitingResponse,
    Succeeded,
    Failed(ErrorKind),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Connecting)
            | (Connecting, AwaitingAck)
            | (AwaitingAck, SendingPayload)
            | (SendingPayload, AwaitingResponse)
            | (AwaitingResponse, Succeeded) => true,
            (Connecting | AwaitingAck | SendingPayload | AwaitingResponse, Failed(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::AwaitingAck => f.write_str("awaiting_ack"),
            Self::SendingPayload => f.write_str("sending_payload"),
            Self::AwaitingResponse => f.write_str("awaiting_response"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed(kind) => write!(f, "failed({kind:?})"),
        }
    }
}
