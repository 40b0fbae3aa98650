//! Wire protocol for sending an encoded image and receiving a caption.
//!
//! One connection carries exactly one exchange: size announcement,
//! acknowledgement, payload, caption. Two wire versions exist; see
//! [`wire`] for the byte layouts.

pub mod endpoint;
pub mod error;
pub mod payload;
pub mod wire;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use endpoint::Endpoint;
pub use error::{EndpointError, ProtocolError, WireError};
pub use payload::{Caption, ImagePayload};

/// Port the captioning server listens on by default.
pub const DEFAULT_PORT: u16 = 5000;

/// Host used when no endpoint is configured.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Upper bound on caption bytes accepted by the client (and sent by the server).
pub const DEFAULT_MAX_CAPTION_LEN: usize = 4096;

/// Quiet time after which a legacy caption is considered complete.
pub const DEFAULT_CAPTION_SETTLE: Duration = Duration::from_millis(200);

/// Upper bound on image bytes accepted by the server (32 MiB).
pub const DEFAULT_MAX_IMAGE_SIZE: u64 = 32 * 1024 * 1024;

/// Size of the acknowledgement buffer, in both wire versions.
pub const ACK_LEN: usize = 16;

/// Bytes the legacy server reads for the size announcement.
pub const LEGACY_SIZE_READ_LEN: usize = 16;

/// Acknowledgement text sent by the legacy server.
pub const LEGACY_ACK: &[u8] = b"SIZE_OK";

/// Framed acknowledgement status: accepted.
pub const ACK_OK: u8 = 0x00;

/// Framed acknowledgement status: payload exceeds the server limit.
pub const ACK_TOO_LARGE: u8 = 0x01;

/// Framed acknowledgement status: server cannot take the request now.
pub const ACK_BUSY: u8 = 0x02;

/// Which byte layout a connection speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireVersion {
    /// ASCII size, content-blind ack, caption read until close.
    #[default]
    Legacy,
    /// Binary size, status ack, length-prefixed caption.
    Framed,
}

impl fmt::Display for WireVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Framed => f.write_str("framed"),
        }
    }
}

impl FromStr for WireVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "framed" => Ok(Self::Framed),
            other => Err(format!("unknown wire version: {other} (expected legacy or framed)")),
        }
    }
}
