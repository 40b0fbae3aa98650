//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use captionlink_protocol::WireVersion;
use captionlink_server::ServerConfig;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address to listen on
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Wire format spoken to clients
    #[arg(short, long)]
    pub wire: Option<WireVersion>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Overrides file values with whatever was given on the command line.
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(wire) = self.wire {
            config.wire_version = wire;
        }
    }
}
