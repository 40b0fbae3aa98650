//! Error types for the caption server.

use captionlink_protocol::WireError;

use crate::captioner::CaptionerError;

/// Errors produced while serving a connection.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("captioning failed: {0}")]
    Captioner(#[from] CaptionerError),

    #[error("client timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,
}
