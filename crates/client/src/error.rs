//! Error types for transfer sessions.

use std::fmt;

use captionlink_protocol::{EndpointError, ProtocolError, WireError};

/// Step of the exchange during which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    SizeAnnouncement,
    Ack,
    Payload,
    Response,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connecting",
            Self::SizeAnnouncement => "announcing size",
            Self::Ack => "waiting for acknowledgement",
            Self::Payload => "sending image",
            Self::Response => "waiting for caption",
        })
    }
}

/// Problems with what the caller handed in, detected before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("no image selected")]
    NoPayload,

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] EndpointError),

    #[error("not connected to a server")]
    NotConnected,

    #[error("connectivity check is older than {max_age_secs}s")]
    StaleProbe { max_age_secs: u64 },
}

/// Errors that end a probe or transfer session.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("connection failed: {0}")]
    Connection(#[source] std::io::Error),

    #[error("I/O error while {stage}: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out while {stage}")]
    Timeout { stage: Stage },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("invalid input: {0}")]
    Input(#[from] InputError),

    #[error("a transfer is already in progress")]
    Busy,

    #[error("cancelled")]
    Cancelled,
}

/// Coarse classification shown to the UI and carried by `Failed` states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Io,
    Protocol,
    Input,
    Busy,
    Cancelled,
}

impl TransferError {
    /// Attributes a wire error to the step that produced it.
    pub fn from_wire(stage: Stage, err: WireError) -> Self {
        match err {
            WireError::Io(source) if stage == Stage::Connect => Self::Connection(source),
            WireError::Io(source) => Self::Io { stage, source },
            WireError::Protocol(p) => Self::Protocol(p),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) => ErrorKind::Connection,
            Self::Timeout {
                stage: Stage::Connect,
            } => ErrorKind::Connection,
            Self::Io { .. } | Self::Timeout { .. } => ErrorKind::Io,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Input(_) => ErrorKind::Input,
            Self::Busy => ErrorKind::Busy,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Short text suitable for a toast or caption overlay.
    pub fn user_message(&self) -> String {
        match self {
            Self::Connection(e) => format!("Connection failed: {e}"),
            Self::Io { stage, source } => format!("Connection lost while {stage}: {source}"),
            Self::Timeout { stage } => format!("Timed out while {stage}"),
            Self::Protocol(ProtocolError::EmptyCaption) => "Server returned no caption".into(),
            Self::Protocol(p) => format!("Unexpected server response: {p}"),
            Self::Input(InputError::NoPayload) => "No image selected".into(),
            Self::Input(InputError::InvalidEndpoint(_)) => "Enter valid IP and Port".into(),
            Self::Input(InputError::NotConnected) => "Not connected to server!".into(),
            Self::Input(InputError::StaleProbe { .. }) => {
                "Connection check expired, connect again".into()
            }
            Self::Busy => "A transfer is already in progress".into(),
            Self::Cancelled => "Transfer cancelled".into(),
        }
    }
}
