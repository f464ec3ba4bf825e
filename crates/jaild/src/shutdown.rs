//! Termination signal handling.
//!
//! SIGTERM is converted into a [`ShutdownToken`] trigger. tokio's OS-level
//! handler only writes to a self-pipe; the token is set from an ordinary
//! task, and the service loop observes it cooperatively.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// One-shot cancellation flag shared between the signal path and the
/// service loop.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    triggered: AtomicBool,
    notify: watch::Sender<bool>,
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownToken {
    /// Create an untriggered token.
    #[must_use]
    pub fn new() -> Self {
        let (notify, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                triggered: AtomicBool::new(false),
                notify,
            }),
        }
    }

    /// Request shutdown. Repeated calls have no further effect.
    ///
    /// Returns `true` for the call that flipped the flag.
    pub fn trigger(&self) -> bool {
        let first = !self.inner.triggered.swap(true, Ordering::SeqCst);
        if first {
            self.inner.notify.send_replace(true);
        }
        first
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Wait until shutdown is requested. Returns immediately if it already
    /// was.
    pub async fn triggered(&self) {
        let mut rx = self.inner.notify.subscribe();
        // The sender lives as long as `self`, so the channel cannot close
        // while we wait.
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

/// Running SIGTERM listener. Dropping it stops listening.
#[derive(Debug)]
pub struct SigtermListener {
    task: JoinHandle<()>,
}

impl Drop for SigtermListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Install the SIGTERM listener.
///
/// The OS handler is registered before this returns, so a SIGTERM delivered
/// afterwards is never lost, even before any socket exists. The listener
/// triggers `token` on the first delivery; later deliveries are absorbed by
/// tokio for as long as the process runs.
///
/// # Errors
/// Returns an error if the signal handler cannot be registered.
pub fn listen_for_sigterm(token: ShutdownToken) -> io::Result<SigtermListener> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let task = tokio::spawn(async move {
        if sigterm.recv().await.is_some() {
            tracing::info!("SIGTERM received; closing sockets");
            token.trigger();
        }
    });
    Ok(SigtermListener { task })
}
