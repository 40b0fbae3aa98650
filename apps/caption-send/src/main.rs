//! caption-send entry point.

mod app;
mod cli;
mod config;
mod terminal;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Logs go to stderr; stdout carries only the caption.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting caption-send");

    let mut config = match &cli.config {
        Some(path) => config::load_from(path)?,
        None => config::load()?,
    };
    cli.apply(&mut config);
    tracing::debug!(
        host = %config.host,
        port = config.port,
        wire = %config.wire_version,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    let succeeded = rt.block_on(app::run(&cli, config))?;

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
