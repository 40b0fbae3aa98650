//! Server orchestration: captioner selection, listener, Ctrl-C shutdown.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use captionlink_server::{CaptionServer, Captioner, CommandCaptioner, FixedCaptioner};

use crate::config::{CaptionerConfig, Config};

/// Runs the server until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("SIGINT received, shutting down");
                    cancel.cancel();
                }
                Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
            }
        })
    };

    let (server, listener) = start(config, cancel).await?;
    let result = server.serve(listener).await;
    watcher.abort();
    result.context("caption server failed")
}

/// Builds the server and binds its listener.
async fn start(
    config: Config,
    cancel: CancellationToken,
) -> anyhow::Result<(CaptionServer, TcpListener)> {
    let captioner = captioner(&config.captioner);
    let addr = config.server.bind_addr();
    let server = CaptionServer::new(config.server, captioner, cancel);
    let listener = server
        .bind()
        .await
        .with_context(|| format!("binding {addr}"))?;
    Ok((server, listener))
}

/// The configured command if any, otherwise the fixed caption.
fn captioner(config: &CaptionerConfig) -> Arc<dyn Captioner> {
    match CommandCaptioner::new(&config.command) {
        Some(command) => {
            info!(command = ?config.command, "captioning with external command");
            Arc::new(command)
        }
        None => {
            info!(caption = %config.fixed, "captioning with a fixed caption");
            Arc::new(FixedCaptioner::new(config.fixed.clone()))
        }
    }
}
