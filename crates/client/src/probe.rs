//! Connectivity probe: connect, then close immediately.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use captionlink_protocol::Endpoint;

use crate::error::TransferError;
use crate::session::connect;

/// Evidence that an endpoint accepted a connection at a point in time.
///
/// Passed explicitly into sends instead of living in ambient state; see
/// [`is_fresh`](Self::is_fresh) for the expiry rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub endpoint: Endpoint,
    pub checked_at: Instant,
    pub latency: Duration,
}

impl ProbeReport {
    pub fn age(&self) -> Duration {
        self.checked_at.elapsed()
    }

    /// True while the probe is younger than `max_age`.
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.age() < max_age
    }
}

/// Checks that `endpoint` accepts TCP connections.
pub async fn probe(
    endpoint: &Endpoint,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ProbeReport, TransferError> {
    let started = Instant::now();
    let stream = connect(endpoint, timeout, cancel).await?;
    drop(stream);

    let latency = started.elapsed();
    debug!(%endpoint, ?latency, "probe connection closed");
    info!(%endpoint, "endpoint reachable");

    Ok(ProbeReport {
        endpoint: endpoint.clone(),
        checked_at: Instant::now(),
        latency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn probe_succeeds_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let endpoint = Endpoint::new("127.0.0.1", port).unwrap();

        let report = probe(&endpoint, Duration::from_secs(2), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.endpoint, endpoint);
        assert!(report.is_fresh(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn probe_fails_when_nothing_listens() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let endpoint = Endpoint::new("127.0.0.1", port).unwrap();

        let err = probe(&endpoint, Duration::from_secs(2), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Connection(_)));
    }

    #[tokio::test]
    async fn probe_honours_cancellation() {
        let endpoint = Endpoint::new("127.0.0.1", 9).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = probe(&endpoint, Duration::from_secs(2), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Cancelled));
    }

    #[test]
    fn zero_max_age_is_never_fresh() {
        let report = ProbeReport {
            endpoint: Endpoint::default(),
            checked_at: Instant::now(),
            latency: Duration::ZERO,
        };
        assert!(!report.is_fresh(Duration::ZERO));
    }
}
