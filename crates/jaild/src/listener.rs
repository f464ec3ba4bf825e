//! TCP accept loop for the daemon.
//!
//! Accepts connections on one listener and hands each to the connection
//! handler on its own task. Accept errors are retried with backoff; a
//! listener that keeps failing takes the daemon down with it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};

use crate::failure::DaemonFailure;
use crate::handler::{ConnectionHandler, Endpoint};

/// Retry budget for failing `accept` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptPolicy {
    /// Consecutive failures tolerated before giving up.
    pub retry_limit: usize,
    /// Delay before the first retry.
    pub min_delay: Duration,
}

/// Build a jittered exponential backoff bounded by `policy.retry_limit`.
pub(crate) fn backoff(policy: AcceptPolicy) -> ExponentialBackoff {
    ExponentialBuilder::default()
        .with_jitter()
        .with_min_delay(policy.min_delay)
        .with_max_times(policy.retry_limit)
        .build()
}

type ConnectionResult = (SocketAddr, Result<(), DaemonFailure>);

/// Accept connections on `listener` until the task is cancelled.
///
/// Connection tasks are owned by the loop, so cancelling it also cancels
/// every in-flight connection and drops the listening socket.
///
/// # Errors
/// Returns a message failure once `accept` has failed more than
/// `policy.retry_limit` times in a row.
pub async fn accept_loop<H: ConnectionHandler>(
    listener: TcpListener,
    endpoint: Endpoint,
    handler: Arc<H>,
    policy: AcceptPolicy,
) -> Result<(), DaemonFailure> {
    let local = listener.local_addr().ok();
    let mut failures = backoff(policy);
    let mut connections: JoinSet<ConnectionResult> = JoinSet::new();

    loop {
        tokio::select! {
            res = listener.accept() => match res {
                Ok((stream, peer)) => {
                    failures = backoff(policy);
                    tracing::debug!(%peer, %endpoint, "accepted connection");
                    let handler = Arc::clone(&handler);
                    connections.spawn(async move {
                        (peer, handler.handle(stream, peer, endpoint).await)
                    });
                }
                Err(e) => {
                    tracing::error!(%endpoint, error = %e, "Failed to accept client connection");
                    let Some(delay) = failures.next() else {
                        let addr = local.map_or_else(|| endpoint.to_string(), |a| a.to_string());
                        return Err(DaemonFailure::message(format!(
                            "accepting connections on {addr} failed: {e}"
                        )));
                    };
                    tokio::time::sleep(delay).await;
                }
            },
            Some(done) = connections.join_next(), if !connections.is_empty() => {
                log_connection_failure(endpoint, &done);
            }
        }
    }
}

/// Log a finished connection task if it failed.
pub(crate) fn log_connection_failure(
    endpoint: Endpoint,
    res: &Result<ConnectionResult, JoinError>,
) {
    match res {
        Ok((_, Ok(()))) => {}
        Ok((peer, Err(e))) => {
            tracing::warn!(%peer, %endpoint, error = %e, "Client handling failed");
        }
        Err(e) => tracing::warn!(%endpoint, error = %e, "Client task aborted"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::subscriber;
    use crate::logging::testing::BufSink;
    use jail_lib::Severity;

    fn captured(res: &Result<ConnectionResult, JoinError>) -> Vec<(Severity, String)> {
        let sink = BufSink::default();
        tracing::subscriber::with_default(subscriber(sink.clone(), Severity::Debug), || {
            log_connection_failure(Endpoint::Plain, res);
        });
        sink.records()
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:4000".parse().expect("addr")
    }

    #[test]
    fn successful_connections_are_silent() {
        assert!(captured(&Ok((peer(), Ok(())))).is_empty());
    }

    #[test]
    fn handler_failures_are_warnings() {
        let records = captured(&Ok((peer(), Err(DaemonFailure::http("bad request")))));
        assert_eq!(records.len(), 1);
        let (severity, message) = &records[0];
        assert_eq!(*severity, Severity::Warning);
        assert!(message.starts_with("Client handling failed"));
        assert!(message.contains("peer=127.0.0.1:4000"));
        assert!(message.contains("error=bad request"));
    }

    #[test]
    fn backoff_is_bounded_by_retry_limit() {
        let policy = AcceptPolicy {
            retry_limit: 3,
            min_delay: Duration::from_millis(1),
        };
        assert_eq!(backoff(policy).count(), 3);
    }
}
