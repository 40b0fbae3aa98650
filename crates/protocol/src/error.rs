//! Error types for the wire protocol.

/// Violations of the exchange contract detected on either side.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("server rejected the request (status {status:#04x})")]
    Rejected { status: u8 },

    #[error("server returned an empty caption")]
    EmptyCaption,

    #[error("caption too large: {declared} bytes (max {max})")]
    CaptionTooLarge { declared: u64, max: usize },

    #[error("invalid size announcement: {0}")]
    InvalidSizeAnnouncement(String),

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: u64, max: u64 },
}

/// Errors produced while reading or writing protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Reasons an endpoint cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("host is empty")]
    EmptyHost,

    #[error("invalid host: {0}")]
    InvalidHost(String),

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("expected host:port, got {0:?}")]
    Malformed(String),
}
