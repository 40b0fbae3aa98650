//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use captionlink_client::ClientConfig;
use captionlink_protocol::WireVersion;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Encoded image file to caption
    pub image: PathBuf,

    /// Caption server host
    #[arg(long)]
    pub host: Option<String>,

    /// Caption server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Wire format spoken by the server
    #[arg(short, long)]
    pub wire: Option<WireVersion>,

    /// Check the server is reachable before sending
    #[arg(long)]
    pub probe: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Overrides file values with whatever was given on the command line.
    pub fn apply(&self, config: &mut ClientConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(wire) = self.wire {
            config.wire_version = wire;
        }
        if self.probe {
            config.require_probe = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "caption-send",
            "photo.jpg",
            "--host",
            "192.168.1.20",
            "--port",
            "6000",
            "--wire",
            "framed",
        ]);
        let mut config = ClientConfig {
            require_probe: false,
            ..ClientConfig::default()
        };
        cli.apply(&mut config);

        assert_eq!(cli.image, PathBuf::from("photo.jpg"));
        assert_eq!(config.host, "192.168.1.20");
        assert_eq!(config.port, 6000);
        assert_eq!(config.wire_version, WireVersion::Framed);
        assert!(!config.require_probe);
    }

    #[test]
    fn absent_flags_keep_config() {
        let cli = Cli::parse_from(["caption-send", "photo.jpg", "--probe"]);
        let mut config = ClientConfig {
            host: "10.0.0.5".into(),
            require_probe: false,
            ..ClientConfig::default()
        };
        cli.apply(&mut config);

        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, ClientConfig::default().port);
        assert!(config.require_probe);
    }

    #[test]
    fn unknown_wire_version_is_rejected() {
        let result = Cli::try_parse_from(["caption-send", "x.png", "--wire", "json"]);
        assert!(result.is_err());
    }
}
