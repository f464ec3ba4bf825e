//! Log capture for tests.
//!
//! [`RecordingSink`] stands in for the system log so tests can assert on
//! exactly what the daemon would have recorded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jail_lib::Severity;
use jaild::logging::LogSink;

/// Sink keeping every record in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl RecordingSink {
    fn lock(&self) -> MutexGuard<'_, Vec<(Severity, String)>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every record written so far, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<(Severity, String)> {
        self.lock().clone()
    }

    /// Messages of every record written so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    /// Whether any record contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|(_, m)| m.contains(needle))
    }
}

impl LogSink for RecordingSink {
    fn write(&self, severity: Severity, message: &str) {
        self.lock().push((severity, message.to_owned()));
    }
}
