//! Per-connection request handling.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::failure::DaemonFailure;

/// Listener a connection arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Plain connections.
    Plain,
    /// Connections the transport terminates TLS on.
    Secure,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "plain",
            Self::Secure => "secure",
        })
    }
}

/// Processes one accepted connection.
///
/// Failures are reported per connection and never stop the daemon.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handle `stream`, accepted from `peer` on `endpoint`.
    fn handle(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        endpoint: Endpoint,
    ) -> impl Future<Output = Result<(), DaemonFailure>> + Send;
}

const UNAVAILABLE_RESPONSE: &[u8] = b"HTTP/1.1 503 Service Unavailable\r\n\
Connection: close\r\n\
Content-Length: 0\r\n\
\r\n";

/// Handler used until request processing is wired in: answers every
/// connection with `503 Service Unavailable` and closes it.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableHandler;

impl ConnectionHandler for UnavailableHandler {
    async fn handle(
        &self,
        mut stream: TcpStream,
        peer: SocketAddr,
        endpoint: Endpoint,
    ) -> Result<(), DaemonFailure> {
        tracing::debug!(%peer, %endpoint, "refusing connection; no request handler installed");
        stream
            .write_all(UNAVAILABLE_RESPONSE)
            .await
            .map_err(|e| DaemonFailure::http(format!("writing response to {peer}: {e}")))?;
        stream
            .shutdown()
            .await
            .map_err(|e| DaemonFailure::http(format!("closing connection to {peer}: {e}")))
    }
}
