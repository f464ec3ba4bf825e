//! The seam between the lifecycle controller and the service it hosts.

use std::future::Future;

use crate::failure::{CloseError, DaemonFailure};

/// A long-running service owning network sockets.
pub trait Service: Send + Sync + 'static {
    /// Run the service loop until it stops or fails.
    fn serve(&self) -> impl Future<Output = Result<(), DaemonFailure>> + Send;

    /// Release every socket the service holds.
    ///
    /// Must be idempotent: closing already-closed sockets succeeds.
    ///
    /// # Errors
    /// Returns an error only when the sockets cannot be released at all.
    fn close_sockets(&self) -> Result<(), CloseError>;
}
