//! The daemon: owner of the listening sockets.
//!
//! [`Daemon`] binds its listeners up front, serves them until the shared
//! [`ShutdownToken`] fires, and releases them on request. It is created once
//! by the binary and shared with the lifecycle controller.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::failure::{CloseError, DaemonFailure};
use crate::handler::{ConnectionHandler, Endpoint, UnavailableHandler};
use crate::listener::{AcceptPolicy, accept_loop};
use crate::service::Service;
use crate::shutdown::ShutdownToken;

/// Errors raised while binding the daemon's listeners.
#[derive(Debug, Error)]
#[error("failed to bind {endpoint} listener on {addr}: {source}")]
pub struct BindError {
    /// Listener that failed.
    pub endpoint: Endpoint,
    /// Requested address.
    pub addr: SocketAddr,
    /// Underlying socket error.
    #[source]
    pub source: io::Error,
}

struct Bound {
    endpoint: Endpoint,
    listener: TcpListener,
}

/// The running service and its sockets.
pub struct Daemon<H = UnavailableHandler> {
    idle: Mutex<Vec<Bound>>,
    addrs: Vec<(Endpoint, SocketAddr)>,
    handler: Arc<H>,
    policy: AcceptPolicy,
    shutdown: ShutdownToken,
}

impl<H: ConnectionHandler> Daemon<H> {
    /// Bind the plain listener and, when configured, the secure one.
    ///
    /// # Errors
    /// Returns a [`BindError`] naming the first address that could not be
    /// bound; listeners bound before it are released.
    pub async fn bind(config: &Config, shutdown: ShutdownToken, handler: H) -> Result<Self, BindError> {
        let requested = [
            Some((Endpoint::Plain, config.plain_addr())),
            config.secure_addr().map(|addr| (Endpoint::Secure, addr)),
        ];
        let mut idle = Vec::with_capacity(requested.len());
        let mut addrs = Vec::with_capacity(requested.len());
        for (endpoint, addr) in requested.into_iter().flatten() {
            let listener = TcpListener::bind(addr).await.map_err(|source| BindError {
                endpoint,
                addr,
                source,
            })?;
            let local = listener.local_addr().unwrap_or(addr);
            tracing::info!(%endpoint, addr = %local, "listening");
            addrs.push((endpoint, local));
            idle.push(Bound { endpoint, listener });
        }
        Ok(Self {
            idle: Mutex::new(idle),
            addrs,
            handler: Arc::new(handler),
            policy: AcceptPolicy {
                retry_limit: config.accept_retry_limit,
                min_delay: Duration::from_millis(config.accept_min_delay_ms),
            },
            shutdown,
        })
    }

    /// Addresses the listeners were bound to, with kernel-assigned ports
    /// resolved.
    #[must_use]
    pub fn local_addrs(&self) -> &[(Endpoint, SocketAddr)] {
        &self.addrs
    }

    /// Token that stops [`Service::serve`] when triggered.
    #[must_use]
    pub fn shutdown_token(&self) -> &ShutdownToken {
        &self.shutdown
    }

    fn take_idle(&self) -> Option<Vec<Bound>> {
        self.idle.lock().ok().map(|mut idle| std::mem::take(&mut *idle))
    }
}

impl<H: ConnectionHandler> Service for Daemon<H> {
    /// Serve every bound listener until shutdown is requested.
    ///
    /// The listeners move into the accept loops, so a second call fails.
    /// All loops and their sockets are gone by the time this returns.
    async fn serve(&self) -> Result<(), DaemonFailure> {
        let sockets = self
            .take_idle()
            .ok_or(DaemonFailure::Literal("socket registry lock poisoned"))?;
        if sockets.is_empty() {
            return Err(DaemonFailure::Literal("no listening sockets available"));
        }

        let mut loops = JoinSet::new();
        for Bound { endpoint, listener } in sockets {
            loops.spawn(accept_loop(
                listener,
                endpoint,
                Arc::clone(&self.handler),
                self.policy,
            ));
        }

        let outcome = tokio::select! {
            () = self.shutdown.triggered() => {
                tracing::info!("shutdown requested; stopping listeners");
                Ok(())
            }
            Some(res) = loops.join_next() => match res {
                Ok(Ok(())) => Err(DaemonFailure::Literal("accept loop stopped unexpectedly")),
                Ok(Err(failure)) => Err(failure),
                Err(join) => Err(DaemonFailure::Unclassified(anyhow::Error::new(join))),
            },
        };
        loops.shutdown().await;
        outcome
    }

    /// Request shutdown and drop any listener not yet being served.
    fn close_sockets(&self) -> Result<(), CloseError> {
        self.shutdown.trigger();
        let released = self.take_idle().ok_or(CloseError::Poisoned)?;
        if !released.is_empty() {
            tracing::debug!(count = released.len(), "released idle listeners");
        }
        Ok(())
    }
}
