//! Run/shutdown sequencing for the daemon process.
//!
//! [`arm`] installs the SIGTERM listener before startup. [`run`] drives the
//! service loop and funnels every outcome through [`conclude`], which closes
//! the sockets and picks the one exit status the process reports.

use std::io::{self, Write};
use std::sync::Arc;

use jail_lib::ExitStatus;
use tracing::{error, info};

use crate::failure::DaemonFailure;
use crate::service::Service;
use crate::shutdown::{self, ShutdownToken, SigtermListener};

/// Install the SIGTERM listener that stops the service loop.
///
/// Called before configuration is loaded or any socket is bound, so a
/// termination request at any point of startup still ends in the exit-code
/// contract.
///
/// # Errors
/// Returns a formatted-message failure if the handler cannot be registered.
pub fn arm(shutdown: &ShutdownToken) -> Result<SigtermListener, DaemonFailure> {
    shutdown::listen_for_sigterm(shutdown.clone()).map_err(install_failure)
}

fn install_failure(e: io::Error) -> DaemonFailure {
    DaemonFailure::message(format!("failed to install SIGTERM handler: {e}"))
}

/// Run `service` to completion and report how the process should exit.
///
/// Every path closes the service's sockets before returning. A panic in the
/// service loop is treated as an unclassified failure. A [`Daemon`] whose
/// token was triggered during startup returns at once, giving a clean stop.
///
/// [`Daemon`]: crate::daemon::Daemon
pub async fn run<S, W>(service: Arc<S>, shutdown: &ShutdownToken, stderr: &mut W) -> ExitStatus
where
    S: Service,
    W: Write,
{
    let outcome = serve(Arc::clone(&service)).await;
    conclude(service.as_ref(), shutdown, outcome, stderr)
}

/// Drive the service loop on its own task so a panic surfaces as a value.
async fn serve<S: Service>(service: Arc<S>) -> Result<(), DaemonFailure> {
    match tokio::spawn(async move { service.serve().await }).await {
        Ok(outcome) => outcome,
        Err(join) => Err(DaemonFailure::Unclassified(anyhow::Error::new(join))),
    }
}

/// Close the sockets and select the exit status for `outcome`.
///
/// A failure is reported first and keeps its own status even if the close
/// that follows also fails. After a clean stop, a failed close is fatal and
/// reported as [`ExitStatus::CleanupFailed`].
pub fn conclude<S, W>(
    service: &S,
    shutdown: &ShutdownToken,
    outcome: Result<(), DaemonFailure>,
    stderr: &mut W,
) -> ExitStatus
where
    S: Service + ?Sized,
    W: Write,
{
    match outcome {
        Ok(()) => {
            if shutdown.is_triggered() {
                info!("service loop stopped after shutdown request");
            }
            match service.close_sockets() {
                Ok(()) => ExitStatus::Clean,
                Err(e) => {
                    error!(error = %e, "Exception closing sockets");
                    ExitStatus::CleanupFailed
                }
            }
        }
        Err(failure) => {
            let status = report(&failure, stderr);
            if let Err(e) = service.close_sockets() {
                error!(error = %e, "failed to close sockets after service failure");
            }
            status
        }
    }
}

/// Report a failure raised before any sockets exist.
///
/// Classified exactly like a service failure; there is nothing to close.
pub fn startup_failure<W: Write>(failure: &DaemonFailure, stderr: &mut W) -> ExitStatus {
    report(failure, stderr)
}

/// Log `failure` and return its exit status. Formatted-message failures
/// are also written to `stderr`.
fn report<W: Write>(failure: &DaemonFailure, stderr: &mut W) -> ExitStatus {
    match failure {
        DaemonFailure::Http { log } => error!("{log}"),
        DaemonFailure::Message(message) => {
            error!("{message}");
            // Nothing useful can be done if stderr itself is gone.
            let _ = writeln!(stderr, "{message}");
        }
        DaemonFailure::Literal(message) => error!("{message}"),
        DaemonFailure::Unclassified(source) => {
            error!(error = %source, "unexpected exception {}:{}", file!(), line!());
        }
    }
    failure.exit_status()
}
