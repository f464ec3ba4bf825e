//! Startup configuration of diagnostic verbosity.
//!
//! Maps the `-d <level>` token onto a syslog mask, opens the system log
//! channel and installs the global subscriber. This runs once, before any
//! other component logs.

use jail_lib::{SERVICE_IDENTITY, Severity};
use tracing::info;

use crate::logging::{self, LogSink, SyslogSink};
use crate::syslog;

/// Configure the system log from a verbosity token.
///
/// Absent or empty tokens select the quiet default ([`Severity::QUIET`]);
/// tokens outside `0..=7` select [`Severity::Debug`]. When a token is given
/// the change is recorded at `info`, which the mask itself may filter out.
///
/// Never fails. A second call keeps the subscriber installed by the first.
pub fn configure(token: Option<&str>) -> Severity {
    configure_with_sink(SyslogSink, token)
}

/// Like [`configure`], with records delivered to `sink` instead of syslog.
pub fn configure_with_sink<K: LogSink>(sink: K, token: Option<&str>) -> Severity {
    syslog::open(SERVICE_IDENTITY);
    let severity = Severity::from_token(token);
    syslog::set_mask(severity);
    logging::init_with_sink(sink, severity);
    announce(token);
    severity
}

/// Record which verbosity took effect, if one was requested.
pub(crate) fn announce(token: Option<&str>) {
    if let Some(raw) = token.filter(|t| !t.is_empty()) {
        info!("Set log mask up to {raw}");
    }
}
