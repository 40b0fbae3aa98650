//! One send-image/receive-caption exchange over one connection.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use captionlink_protocol::wire::{
    read_ack, read_caption, read_legacy_caption_into, write_payload, write_size_announcement,
};
use captionlink_protocol::{Caption, Endpoint, ImagePayload, WireError, WireVersion};

use crate::config::ClientConfig;
use crate::error::{Stage, TransferError};
use crate::state::SessionState;

/// Runs `fut` under a deadline, giving up early if `cancel` fires.
pub(crate) async fn guarded<T, F>(
    cancel: &CancellationToken,
    limit: Duration,
    stage: Stage,
    fut: F,
) -> Result<T, TransferError>
where
    F: Future<Output = Result<T, WireError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransferError::Cancelled),
        result = tokio::time::timeout(limit, fut) => match result {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(TransferError::from_wire(stage, e)),
            Err(_) => Err(TransferError::Timeout { stage }),
        },
    }
}

/// Opens a TCP connection to `endpoint` within `limit`.
pub(crate) async fn connect(
    endpoint: &Endpoint,
    limit: Duration,
    cancel: &CancellationToken,
) -> Result<TcpStream, TransferError> {
    guarded(cancel, limit, Stage::Connect, async {
        TcpStream::connect(endpoint.connect_target())
            .await
            .map_err(WireError::from)
    })
    .await
}

/// What a finished session hands back to its owner.
#[derive(Debug)]
pub struct SessionReport {
    pub id: Uuid,
    pub endpoint: Endpoint,
    pub outcome: Result<Caption, TransferError>,
    pub elapsed: Duration,
}

impl SessionReport {
    pub fn final_state(&self) -> SessionState {
        match &self.outcome {
            Ok(_) => SessionState::Succeeded,
            Err(e) => SessionState::Failed(e.kind()),
        }
    }
}

/// A single transfer: one endpoint, one payload, one connection.
///
/// Created per send and consumed by [`run`](Self::run); never reused.
#[derive(Debug)]
pub struct TransferSession {
    id: Uuid,
    endpoint: Endpoint,
    payload: ImagePayload,
    state: SessionState,
}

impl TransferSession {
    pub fn new(endpoint: Endpoint, payload: ImagePayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint,
            payload,
            state: SessionState::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Drives the session to `Succeeded` or `Failed`.
    ///
    /// `on_state` sees every transition, the terminal one exactly once.
    /// The connection lives inside this call and is closed on every path.
    pub async fn run<F>(
        mut self,
        config: &ClientConfig,
        cancel: CancellationToken,
        mut on_state: F,
    ) -> SessionReport
    where
        F: FnMut(Uuid, SessionState),
    {
        let started = Instant::now();
        let outcome = self.exchange(config, &cancel, &mut on_state).await;

        let terminal = match &outcome {
            Ok(caption) => {
                info!(
                    session = %self.id,
                    endpoint = %self.endpoint,
                    caption_len = caption.as_str().len(),
                    "transfer succeeded"
                );
                SessionState::Succeeded
            }
            Err(e) => {
                warn!(
                    session = %self.id,
                    endpoint = %self.endpoint,
                    state = %self.state,
                    error = %e,
                    "transfer failed"
                );
                SessionState::Failed(e.kind())
            }
        };
        self.transition(terminal, &mut on_state);

        SessionReport {
            id: self.id,
            endpoint: self.endpoint,
            outcome,
            elapsed: started.elapsed(),
        }
    }

    async fn exchange<F>(
        &mut self,
        config: &ClientConfig,
        cancel: &CancellationToken,
        on_state: &mut F,
    ) -> Result<Caption, TransferError>
    where
        F: FnMut(Uuid, SessionState),
    {
        let version = config.wire_version;

        self.transition(SessionState::Connecting, on_state);
        let mut stream = connect(&self.endpoint, config.connect_timeout(), cancel).await?;
        debug!(session = %self.id, endpoint = %self.endpoint, "connected");

        self.transition(SessionState::AwaitingAck, on_state);
        let len = self.payload.len() as u64;
        guarded(
            cancel,
            config.send_timeout(),
            Stage::SizeAnnouncement,
            write_size_announcement(&mut stream, version, len),
        )
        .await?;
        guarded(
            cancel,
            config.ack_timeout(),
            Stage::Ack,
            read_ack(&mut stream, version),
        )
        .await?;

        self.transition(SessionState::SendingPayload, on_state);
        guarded(
            cancel,
            config.send_timeout(),
            Stage::Payload,
            write_payload(&mut stream, &self.payload),
        )
        .await?;
        debug!(session = %self.id, bytes = len, "payload sent");

        self.transition(SessionState::AwaitingResponse, on_state);
        let caption = match version {
            WireVersion::Framed => {
                guarded(
                    cancel,
                    config.response_timeout(),
                    Stage::Response,
                    read_caption(
                        &mut stream,
                        version,
                        config.max_caption_len,
                        config.caption_settle(),
                    ),
                )
                .await?
            }
            WireVersion::Legacy => {
                let mut buf = Vec::new();
                match guarded(
                    cancel,
                    config.response_timeout(),
                    Stage::Response,
                    read_legacy_caption_into(
                        &mut stream,
                        &mut buf,
                        config.max_caption_len,
                        config.caption_settle(),
                    ),
                )
                .await
                {
                    Ok(()) => {}
                    // A server that keeps sending never settles; what arrived is the caption.
                    Err(TransferError::Timeout { .. }) if !buf.is_empty() => {
                        debug!(session = %self.id, received = buf.len(), "caption deadline reached with data");
                    }
                    Err(e) => return Err(e),
                }
                Caption::from_bytes(&buf)?
            }
        };

        drop(stream);
        debug!(session = %self.id, "connection closed");
        Ok(caption)
    }

    fn transition<F>(&mut self, next: SessionState, on_state: &mut F)
    where
        F: FnMut(Uuid, SessionState),
    {
        debug_assert!(
            self.state.can_transition_to(&next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(session = %self.id, from = %self.state, to = %next, "session state");
        self.state = next;
        on_state(self.id, next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use captionlink_protocol::{ACK_LEN, WireVersion};

    use crate::error::ErrorKind;

    async fn local_listener() -> (TcpListener, Endpoint) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, Endpoint::new("127.0.0.1", port).unwrap())
    }

    fn fast_config() -> ClientConfig {
        ClientConfig {
            connect_timeout_ms: 2_000,
            ack_timeout_ms: 2_000,
            send_timeout_ms: 2_000,
            response_timeout_ms: 2_000,
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn records_every_transition_in_order() {
        let (listener, endpoint) = local_listener().await;
        let server = tokio::spawn(async move {
            let (mut s, _) = listener.accept().await.unwrap();
            let mut size = [0u8; 16];
            let n = s.read(&mut size).await.unwrap();
            assert_eq!(&size[..n], b"3");
            s.write_all(&[0u8; ACK_LEN]).await.unwrap();
            let mut payload = [0u8; 3];
            s.read_exact(&mut payload).await.unwrap();
            s.write_all(b"three bytes").await.unwrap();
        });

        let session = TransferSession::new(endpoint, ImagePayload::new(vec![1, 2, 3]));
        let mut seen = Vec::new();
        let report = session
            .run(&fast_config(), CancellationToken::new(), |_, s| seen.push(s))
            .await;
        server.await.unwrap();

        assert_eq!(report.outcome.unwrap().as_str(), "three bytes");
        assert_eq!(
            seen,
            vec![
                SessionState::Connecting,
                SessionState::AwaitingAck,
                SessionState::SendingPayload,
                SessionState::AwaitingResponse,
                SessionState::Succeeded,
            ]
        );
    }

    #[tokio::test]
    async fn refused_connection_fails_in_connecting() {
        let (listener, endpoint) = local_listener().await;
        drop(listener);

        let session = TransferSession::new(endpoint, ImagePayload::new(vec![0u8; 4]));
        let mut seen = Vec::new();
        let report = session
            .run(&fast_config(), CancellationToken::new(), |_, s| seen.push(s))
            .await;

        assert!(matches!(report.outcome, Err(TransferError::Connection(_))));
        assert_eq!(
            seen,
            vec![
                SessionState::Connecting,
                SessionState::Failed(ErrorKind::Connection)
            ]
        );
    }

    #[tokio::test]
    async fn silent_server_times_out_waiting_for_ack() {
        let (listener, endpoint) = local_listener().await;
        let server = tokio::spawn(async move {
            let (s, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(s);
        });

        let config = ClientConfig {
            ack_timeout_ms: 100,
            ..fast_config()
        };
        let session = TransferSession::new(endpoint, ImagePayload::new(vec![0u8; 4]));
        let report = session
            .run(&config, CancellationToken::new(), |_, _| {})
            .await;

        assert!(matches!(
            report.outcome,
            Err(TransferError::Timeout { stage: Stage::Ack })
        ));
        assert_eq!(report.final_state(), SessionState::Failed(ErrorKind::Io));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_interrupts_response_wait() {
        let (listener, endpoint) = local_listener().await;
        let server = tokio::spawn(async move {
            let (mut s, _) = listener.accept().await.unwrap();
            let mut size = [0u8; 16];
            let _ = s.read(&mut size).await.unwrap();
            s.write_all(b"SIZE_OK").await.unwrap();
            let mut payload = [0u8; 4];
            s.read_exact(&mut payload).await.unwrap();
            // Never answer; wait for the client to go away.
            let mut rest = Vec::new();
            let _ = s.read_to_end(&mut rest).await;
        });

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let session = TransferSession::new(endpoint, ImagePayload::new(vec![9u8; 4]));
        let report = session
            .run(&fast_config(), cancel, move |_, s| {
                if s == SessionState::AwaitingResponse {
                    trigger.cancel();
                }
            })
            .await;

        assert!(matches!(report.outcome, Err(TransferError::Cancelled)));
        assert_eq!(report.final_state(), SessionState::Failed(ErrorKind::Cancelled));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn framed_rejection_fails_fast() {
        let (listener, endpoint) = local_listener().await;
        let server = tokio::spawn(async move {
            let (mut s, _) = listener.accept().await.unwrap();
            let _ = s.read_u64().await.unwrap();
            let mut ack = [0u8; ACK_LEN];
            ack[0] = captionlink_protocol::ACK_TOO_LARGE;
            s.write_all(&ack).await.unwrap();
        });

        let config = ClientConfig {
            wire_version: WireVersion::Framed,
            ..fast_config()
        };
        let mut seen = Vec::new();
        let session = TransferSession::new(endpoint, ImagePayload::new(vec![0u8; 8]));
        let report = session
            .run(&config, CancellationToken::new(), |_, s| seen.push(s))
            .await;

        assert!(matches!(
            report.outcome,
            Err(TransferError::Protocol(
                captionlink_protocol::ProtocolError::Rejected { status: 0x01 }
            ))
        ));
        assert!(!seen.contains(&SessionState::SendingPayload));
        server.await.unwrap();
    }
}
