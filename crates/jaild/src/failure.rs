//! Failure kinds that can escape the service loop.

use jail_lib::ExitStatus;
use thiserror::Error;

/// Failures raised by a service, in classification priority order.
#[derive(Debug, Error)]
pub enum DaemonFailure {
    /// The HTTP layer failed; `log` is the record to write.
    #[error("{log}")]
    Http {
        /// Text written to the system log.
        log: String,
    },
    /// A failure described by a formatted message.
    #[error("{0}")]
    Message(String),
    /// A failure described by fixed text.
    #[error("{0}")]
    Literal(&'static str),
    /// A failure carrying no classification.
    #[error("unexpected failure: {0:#}")]
    Unclassified(#[source] anyhow::Error),
}

impl DaemonFailure {
    /// Build an HTTP-layer failure.
    pub fn http(log: impl Into<String>) -> Self {
        Self::Http { log: log.into() }
    }

    /// Build a formatted-message failure.
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }

    /// Exit status reported when this failure ends the process.
    #[must_use]
    pub const fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Http { .. } => ExitStatus::Http,
            Self::Message(_) => ExitStatus::Message,
            Self::Literal(_) => ExitStatus::Literal,
            Self::Unclassified(_) => ExitStatus::Unclassified,
        }
    }
}

/// Errors raised while releasing a service's sockets.
#[derive(Debug, Error)]
pub enum CloseError {
    /// The socket registry lock was poisoned by a panicking holder.
    #[error("socket registry lock poisoned")]
    Poisoned,
    /// The operating system rejected the close.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DaemonFailure::http("bad request line"), ExitStatus::Http)]
    #[case(DaemonFailure::message("disk full"), ExitStatus::Message)]
    #[case(DaemonFailure::Literal("no sockets"), ExitStatus::Literal)]
    #[case(DaemonFailure::Unclassified(anyhow::anyhow!("boom")), ExitStatus::Unclassified)]
    fn maps_failures_to_exit_status(#[case] failure: DaemonFailure, #[case] expected: ExitStatus) {
        assert_eq!(failure.exit_status(), expected);
    }

    #[test]
    fn displays_carried_text() {
        assert_eq!(DaemonFailure::http("bad header").to_string(), "bad header");
        assert_eq!(DaemonFailure::message("disk full").to_string(), "disk full");
        assert_eq!(DaemonFailure::Literal("fixed").to_string(), "fixed");
        assert_eq!(
            DaemonFailure::Unclassified(anyhow::anyhow!("boom")).to_string(),
            "unexpected failure: boom"
        );
    }
}
