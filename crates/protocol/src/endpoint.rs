//! Server address as entered by the user.

use std::fmt;
use std::str::FromStr;

use crate::error::EndpointError;
use crate::{DEFAULT_HOST, DEFAULT_PORT};

/// Host/port pair identifying a captioning server.
///
/// Always valid once constructed: the host is non-empty and contains no
/// whitespace, and the port is non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Validates and builds an endpoint. Surrounding whitespace in `host` is
    /// trimmed, matching what a text field hands over.
    pub fn new(host: impl AsRef<str>, port: u16) -> Result<Self, EndpointError> {
        let host = host.as_ref().trim();
        if host.is_empty() {
            return Err(EndpointError::EmptyHost);
        }
        if host.chars().any(char::is_whitespace) {
            return Err(EndpointError::InvalidHost(host.to_string()));
        }
        if port == 0 {
            return Err(EndpointError::InvalidPort(port.to_string()));
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Builds an endpoint from raw text inputs, as the original form does
    /// with its separate IP and port fields.
    pub fn from_parts(host: &str, port: &str) -> Result<Self, EndpointError> {
        let port = port.trim();
        let port: u16 = port
            .parse()
            .map_err(|_| EndpointError::InvalidPort(port.to_string()))?;
        Self::new(host, port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Target usable with `TcpStream::connect`.
    pub fn connect_target(&self) -> (&str, u16) {
        (&self.host, self.port)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    /// Parses `host:port`, including bracketed IPv6 (`[::1]:5000`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| EndpointError::Malformed(s.to_string()))?;

        let host = match host.strip_prefix('[') {
            Some(rest) => rest
                .strip_suffix(']')
                .ok_or_else(|| EndpointError::Malformed(s.to_string()))?,
            None if host.contains(':') => return Err(EndpointError::Malformed(s.to_string())),
            None => host,
        };

        Self::from_parts(host, port)
    }
}
