//! Server settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use captionlink_protocol::{
    DEFAULT_MAX_CAPTION_LEN, DEFAULT_MAX_IMAGE_SIZE, DEFAULT_PORT, WireVersion,
};

/// Caption server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind, e.g. `0.0.0.0`.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Listen port (0 = auto-assign).
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub wire_version: WireVersion,

    /// Largest announced image accepted.
    #[serde(default = "default_max_image_size")]
    pub max_image_size: u64,

    /// Captions longer than this are truncated before sending.
    #[serde(default = "default_max_caption_len")]
    pub max_caption_len: usize,

    /// Deadline for each read or write on a client connection.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
}

fn default_bind() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_image_size() -> u64 {
    DEFAULT_MAX_IMAGE_SIZE
}

fn default_max_caption_len() -> usize {
    DEFAULT_MAX_CAPTION_LEN
}

fn default_io_timeout_ms() -> u64 {
    30_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            wire_version: WireVersion::default(),
            max_image_size: default_max_image_size(),
            max_caption_len: default_max_caption_len(),
            io_timeout_ms: default_io_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
