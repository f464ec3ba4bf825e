//! Logging utilities for the daemon.
//!
//! Routes `tracing` events to the system log through [`SyslogLayer`],
//! filtered by the severity selected at startup. When `RUST_LOG` is set, a
//! human-readable copy is also written to stderr for foreground debugging.

use std::fmt::{self, Write as _};
use std::io;

use jail_lib::Severity;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::fmt::layer as fmt_layer;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::syslog;

/// Destination for rendered log records.
pub trait LogSink: Send + Sync + 'static {
    /// Record `message` at `severity`.
    fn write(&self, severity: Severity, message: &str);
}

/// Sink writing to the process-wide system log channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyslogSink;

impl LogSink for SyslogSink {
    fn write(&self, severity: Severity, message: &str) {
        syslog::send(severity, message);
    }
}

/// Map a `tracing` level onto the syslog tier it is recorded at.
#[must_use]
pub fn severity_for(level: Level) -> Severity {
    match level {
        Level::ERROR => Severity::Error,
        Level::WARN => Severity::Warning,
        Level::INFO => Severity::Info,
        Level::DEBUG | Level::TRACE => Severity::Debug,
    }
}

/// Most verbose `tracing` level that can still pass a `mask`.
#[must_use]
pub fn level_filter(mask: Severity) -> LevelFilter {
    match mask {
        Severity::Emergency | Severity::Alert | Severity::Critical | Severity::Error => {
            LevelFilter::ERROR
        }
        Severity::Warning => LevelFilter::WARN,
        Severity::Notice | Severity::Info => LevelFilter::INFO,
        Severity::Debug => LevelFilter::TRACE,
    }
}

/// Layer forwarding each event to a [`LogSink`].
///
/// Events are rendered as the message followed by `key=value` pairs for the
/// remaining fields. Events above `mask` are dropped before rendering.
#[derive(Debug, Clone)]
pub struct SyslogLayer<K> {
    sink: K,
    mask: Severity,
}

impl<K: LogSink> SyslogLayer<K> {
    /// Build a layer writing to `sink` and admitting tiers up to `mask`.
    pub fn new(sink: K, mask: Severity) -> Self {
        Self { sink, mask }
    }
}

impl<S, K> Layer<S> for SyslogLayer<K>
where
    S: Subscriber,
    K: LogSink,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let severity = severity_for(*event.metadata().level());
        if !self.mask.admits(severity) {
            return;
        }
        let mut record = RecordVisitor::default();
        event.record(&mut record);
        self.sink.write(severity, &record.finish());
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: String,
    fields: String,
}

impl RecordVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_owned()
        } else {
            self.message + &self.fields
        }
    }
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}

/// Install the global subscriber writing to `sink`.
///
/// Returns `false` when a global subscriber was already installed; the
/// existing one is left untouched.
///
/// # Examples
///
/// ```rust,no_run
/// use jail_lib::Severity;
/// use jaild::logging::{SyslogSink, init_with_sink};
///
/// init_with_sink(SyslogSink, Severity::Info);
/// tracing::info!("logging is initialized");
/// ```
pub fn init_with_sink<K: LogSink>(sink: K, mask: Severity) -> bool {
    let stderr = EnvFilter::try_from_default_env().ok().map(|filter| {
        fmt_layer()
            .with_writer(io::stderr)
            .with_filter(filter)
    });
    Registry::default()
        .with(SyslogLayer::new(sink, mask).with_filter(level_filter(mask)))
        .with(stderr)
        .try_init()
        .is_ok()
}

/// Build a subscriber writing only to `sink`, for scoped use with
/// [`tracing::subscriber::with_default`].
pub fn subscriber<K: LogSink>(sink: K, mask: Severity) -> impl Subscriber + Send + Sync {
    Registry::default().with(SyslogLayer::new(sink, mask).with_filter(level_filter(mask)))
}


#[cfg(test)]
mod tests {
    use super::testing::BufSink;
    use super::*;
    use rstest::rstest;
    use tracing::{debug, error, info, warn};

    #[rstest]
    #[case(Level::ERROR, Severity::Error)]
    #[case(Level::WARN, Severity::Warning)]
    #[case(Level::INFO, Severity::Info)]
    #[case(Level::DEBUG, Severity::Debug)]
    #[case(Level::TRACE, Severity::Debug)]
    fn maps_levels(#[case] level: Level, #[case] expected: Severity) {
        assert_eq!(severity_for(level), expected);
    }

    #[test]
    fn renders_message_and_fields() {
        let sink = BufSink::default();
        tracing::subscriber::with_default(subscriber(sink.clone(), Severity::Debug), || {
            error!(addr = "127.0.0.1:80", attempt = 3, "accept failed");
        });
        assert_eq!(
            sink.records(),
            vec![(
                Severity::Error,
                "accept failed addr=127.0.0.1:80 attempt=3".to_owned()
            )]
        );
    }

    #[test]
    fn drops_events_above_mask() {
        let sink = BufSink::default();
        tracing::subscriber::with_default(subscriber(sink.clone(), Severity::Warning), || {
            error!("kept error");
            warn!("kept warning");
            info!("dropped info");
            debug!("dropped debug");
        });
        assert_eq!(sink.messages(), ["kept error", "kept warning"]);
    }

    #[test]
    fn quiet_mask_records_errors_only() {
        let sink = BufSink::default();
        tracing::subscriber::with_default(subscriber(sink.clone(), Severity::QUIET), || {
            warn!("dropped");
            error!("captured");
        });
        assert_eq!(sink.records(), vec![(Severity::Error, "captured".to_owned())]);
    }

    #[rstest]
    #[case(Severity::Emergency, LevelFilter::ERROR)]
    #[case(Severity::Error, LevelFilter::ERROR)]
    #[case(Severity::Warning, LevelFilter::WARN)]
    #[case(Severity::Notice, LevelFilter::INFO)]
    #[case(Severity::Info, LevelFilter::INFO)]
    #[case(Severity::Debug, LevelFilter::TRACE)]
    fn level_filter_tracks_mask(#[case] mask: Severity, #[case] expected: LevelFilter) {
        assert_eq!(level_filter(mask), expected);
    }
}
