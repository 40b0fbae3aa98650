//! Client settings.
//!
//! Durations are stored as integer milliseconds/seconds so the struct maps
//! directly onto a TOML file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use captionlink_protocol::{
    DEFAULT_CAPTION_SETTLE, DEFAULT_HOST, DEFAULT_MAX_CAPTION_LEN, DEFAULT_PORT, Endpoint,
    EndpointError, WireVersion,
};

/// Transfer client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server host used when no probe has selected one.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port used when no probe has selected one.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Byte layout spoken on the connection.
    #[serde(default)]
    pub wire_version: WireVersion,

    /// Require a fresh connectivity probe before every send.
    #[serde(default = "default_true")]
    pub require_probe: bool,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Covers server-side inference, so it is the longest.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// How long a successful probe keeps sending enabled.
    #[serde(default = "default_probe_max_age_secs")]
    pub probe_max_age_secs: u64,

    /// Caption bytes kept (legacy) or accepted (framed).
    #[serde(default = "default_max_caption_len")]
    pub max_caption_len: usize,

    /// Quiet time that ends a legacy caption when the server keeps the
    /// connection open.
    #[serde(default = "default_caption_settle_ms")]
    pub caption_settle_ms: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.into()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_ack_timeout_ms() -> u64 {
    10_000
}

fn default_send_timeout_ms() -> u64 {
    30_000
}

fn default_response_timeout_ms() -> u64 {
    60_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_probe_max_age_secs() -> u64 {
    300
}

fn default_max_caption_len() -> usize {
    DEFAULT_MAX_CAPTION_LEN
}

fn default_caption_settle_ms() -> u64 {
    DEFAULT_CAPTION_SETTLE.as_millis() as u64
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            wire_version: WireVersion::default(),
            require_probe: default_true(),
            connect_timeout_ms: default_connect_timeout_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            response_timeout_ms: default_response_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            probe_max_age_secs: default_probe_max_age_secs(),
            max_caption_len: default_max_caption_len(),
            caption_settle_ms: default_caption_settle_ms(),
        }
    }
}

impl ClientConfig {
    /// The configured endpoint, validated.
    pub fn endpoint(&self) -> Result<Endpoint, EndpointError> {
        Endpoint::new(&self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn probe_max_age(&self) -> Duration {
        Duration::from_secs(self.probe_max_age_secs)
    }

    pub fn caption_settle(&self) -> Duration {
        Duration::from_millis(self.caption_settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.wire_version, WireVersion::Legacy);
        assert!(config.require_probe);
        assert_eq!(config.max_caption_len, 4096);
        assert_eq!(config.response_timeout(), Duration::from_secs(60));
        assert_eq!(config.probe_max_age(), Duration::from_secs(300));
        assert_eq!(config.caption_settle(), Duration::from_millis(200));
    }

    #[test]
    fn settle_missing_from_file_uses_default() {
        let config: ClientConfig = toml::from_str("port = 6000\n").unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.caption_settle_ms, 200);
    }

    #[test]
    fn default_endpoint_is_valid() {
        let ep = ClientConfig::default().endpoint().unwrap();
        assert_eq!(ep.port(), 5000);
    }

    #[test]
    fn invalid_host_surfaces_on_endpoint() {
        let config = ClientConfig {
            host: " ".into(),
            ..ClientConfig::default()
        };
        assert_eq!(config.endpoint(), Err(EndpointError::EmptyHost));
    }
}
