//! Shared types for the jail daemon.
//!
//! This library defines the contract between the daemon and whatever
//! supervises it: the syslog severity tiers selected at startup and the
//! process exit codes reported on shutdown.

use std::fmt;

/// Identity under which the daemon writes to the system log.
///
/// Shared by the daemon and its tooling so log queries stay in sync.
pub const SERVICE_IDENTITY: &str = "jaild";

/// Syslog severity tiers, from most severe to most verbose.
///
/// The discriminants match the `LOG_*` priority values defined by
/// `syslog.h` on every supported platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// System is unusable.
    Emergency = 0,
    /// Action must be taken immediately.
    Alert = 1,
    /// Critical conditions.
    Critical = 2,
    /// Error conditions.
    Error = 3,
    /// Warning conditions.
    Warning = 4,
    /// Normal but significant conditions.
    Notice = 5,
    /// Informational messages.
    Info = 6,
    /// Debug-level messages.
    Debug = 7,
}

impl Severity {
    /// Every tier in ascending verbosity.
    pub const ALL: [Self; 8] = [
        Self::Emergency,
        Self::Alert,
        Self::Critical,
        Self::Error,
        Self::Warning,
        Self::Notice,
        Self::Info,
        Self::Debug,
    ];

    /// Tier used when no verbosity is requested.
    pub const QUIET: Self = Self::Error;

    /// Resolve a command-line verbosity token into a tier.
    ///
    /// An absent or empty token selects [`Severity::QUIET`]. Anything that
    /// is not a decimal integer in `0..=7` selects [`Severity::Debug`], so a
    /// malformed request errs towards recording more rather than less.
    ///
    /// # Examples
    ///
    /// ```
    /// use jail_lib::Severity;
    ///
    /// assert_eq!(Severity::from_token(None), Severity::Error);
    /// assert_eq!(Severity::from_token(Some("4")), Severity::Warning);
    /// assert_eq!(Severity::from_token(Some("9")), Severity::Debug);
    /// ```
    #[must_use]
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(str::trim) {
            None | Some("") => Self::QUIET,
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .and_then(Self::from_level)
                .unwrap_or(Self::Debug),
        }
    }

    /// Map a numeric level onto a tier, rejecting values outside `0..=7`.
    #[must_use]
    pub fn from_level(level: i64) -> Option<Self> {
        usize::try_from(level)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    /// Numeric syslog priority of this tier.
    #[must_use]
    pub const fn priority(self) -> i32 {
        self as i32
    }

    /// Bit mask admitting this tier and every more severe one.
    ///
    /// Equivalent to the `LOG_UPTO` macro from `syslog.h`.
    #[must_use]
    pub const fn upto_mask(self) -> i32 {
        (1 << (self.priority() + 1)) - 1
    }

    /// Whether a record at `other` passes a mask set to this tier.
    #[must_use]
    pub fn admits(self, other: Self) -> bool {
        other <= self
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Emergency => "emerg",
            Self::Alert => "alert",
            Self::Critical => "crit",
            Self::Error => "err",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
        };
        f.write_str(name)
    }
}

/// Process exit codes reported by the daemon.
///
/// The numeric values are a stable contract for init systems and other
/// supervisors that restart the daemon on specific codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    /// The service loop stopped and its sockets were released.
    Clean = 0,
    /// The service failed with a formatted message.
    Message = 1,
    /// The service failed with a fixed message.
    Literal = 2,
    /// The service failed in a way that carries no classification.
    Unclassified = 3,
    /// Releasing the sockets after a clean stop failed.
    CleanupFailed = 4,
    /// The HTTP layer reported a failure.
    Http = 123,
}

impl ExitStatus {
    /// Numeric process exit code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        Self::from(status.code())
    }
}
