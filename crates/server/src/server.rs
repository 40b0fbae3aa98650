//! Accept loop and per-connection exchange.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use captionlink_protocol::wire::{
    read_payload, read_size_announcement, write_ack, write_caption, write_rejection,
};
use captionlink_protocol::{ACK_TOO_LARGE, ProtocolError, WireError};

use crate::captioner::Captioner;
use crate::config::ServerConfig;
use crate::error::ServerError;

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// What one served connection exchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSummary {
    pub announced: u64,
    pub received: usize,
    pub caption: String,
}

/// TCP server answering each connection with one caption.
pub struct CaptionServer {
    config: ServerConfig,
    captioner: Arc<dyn Captioner>,
    cancel: CancellationToken,
}

impl CaptionServer {
    pub fn new(
        config: ServerConfig,
        captioner: Arc<dyn Captioner>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            captioner,
            cancel,
        }
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        info!(
            addr = %listener.local_addr()?,
            wire = %self.config.wire_version,
            "caption server listening"
        );
        Ok(listener)
    }

    /// Accepts connections until cancelled, serving each on its own task.
    ///
    /// A failed accept is logged and retried; only cancellation ends the
    /// loop.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        self.accept_loop(&listener).await
    }

    async fn accept_loop<L: Acceptor>(&self, listener: &L) -> Result<(), ServerError> {
        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("caption server stopped");
                    return Ok(());
                }
                result = listener.accept() => result,
            };
            let (stream, addr) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {}
                        _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                    }
                    continue;
                }
            };

            let config = self.config.clone();
            let captioner = Arc::clone(&self.captioner);
            let cancel = self.cancel.child_token();
            tokio::spawn(async move {
                serve_one(stream, addr, &config, captioner, cancel).await;
            });
        }
    }
}

/// Source of incoming connections.
trait Acceptor {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn accept(&self) -> impl Future<Output = std::io::Result<(Self::Stream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    type Stream = TcpStream;

    fn accept(&self) -> impl Future<Output = std::io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

async fn serve_one<S>(
    stream: S,
    addr: SocketAddr,
    config: &ServerConfig,
    captioner: Arc<dyn Captioner>,
    cancel: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!(%addr, "client connected");
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ServerError::Cancelled),
        result = handle_connection(stream, config, captioner) => result,
    };
    match result {
        Ok(summary) => info!(
            %addr,
            bytes = summary.received,
            caption = %summary.caption,
            "caption sent"
        ),
        Err(e) => warn!(%addr, error = %e, "connection ended without a caption"),
    }
}

/// Serves one exchange on `stream`, then drops (closes) it.
pub async fn handle_connection<S>(
    mut stream: S,
    config: &ServerConfig,
    captioner: Arc<dyn Captioner>,
) -> Result<ExchangeSummary, ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let version = config.wire_version;
    let limit = config.io_timeout();

    let announced = within(limit, read_size_announcement(&mut stream, version)).await?;
    if announced > config.max_image_size {
        within(limit, write_rejection(&mut stream, version, ACK_TOO_LARGE)).await?;
        return Err(WireError::from(ProtocolError::PayloadTooLarge {
            size: announced,
            max: config.max_image_size,
        })
        .into());
    }
    within(limit, write_ack(&mut stream, version)).await?;
    debug!(announced, "size acknowledged");

    let image = within(limit, read_payload(&mut stream, version, announced)).await?;
    let received = image.len();
    debug!(received, "image received, captioning");

    let caption = tokio::task::spawn_blocking(move || captioner.caption(&image))
        .await
        .map_err(|e| ServerError::Io(std::io::Error::other(e)))??;

    within(
        limit,
        write_caption(&mut stream, version, &caption, config.max_caption_len),
    )
    .await?;

    Ok(ExchangeSummary {
        announced,
        received,
        caption,
    })
}

async fn within<T, F>(limit: Duration, fut: F) -> Result<T, ServerError>
where
    F: Future<Output = Result<T, WireError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ServerError::Timeout),
    }
}
