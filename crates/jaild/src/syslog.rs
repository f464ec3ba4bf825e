//! Minimal bindings to the platform system log.
//!
//! Wraps `openlog(3)`, `setlogmask(3)`, `syslog(3)` and `closelog(3)`. The
//! channel is process-wide state owned by libc, so these functions are free
//! rather than methods on a handle.

use std::ffi::{CStr, CString};
use std::sync::OnceLock;

use jail_lib::Severity;

/// Identity passed to `openlog`. libc keeps the pointer rather than a copy,
/// so the string must live for the rest of the process.
static IDENTITY: OnceLock<CString> = OnceLock::new();

/// Open the system log channel under `identity` with the `LOG_DAEMON`
/// facility, tagging every record with the process id.
///
/// Only the first identity is retained; later calls reopen the channel with
/// it.
pub fn open(identity: &str) {
    let ident = IDENTITY.get_or_init(|| to_c_string(identity));
    // SAFETY: `ident` lives in a static and is never dropped or mutated,
    // satisfying openlog's requirement that the identity outlive the channel.
    unsafe { libc::openlog(ident.as_ptr(), libc::LOG_PID, libc::LOG_DAEMON) };
}

/// Restrict the channel to `severity` and every more severe tier.
///
/// Returns the previous mask.
pub fn set_mask(severity: Severity) -> i32 {
    // SAFETY: setlogmask only swaps an integer in libc's logging state.
    unsafe { libc::setlogmask(severity.upto_mask()) }
}

/// Write `message` at `severity`.
///
/// Records above the current mask are discarded by libc.
pub fn send(severity: Severity, message: &str) {
    const FORMAT: &CStr = c"%s";
    let text = to_c_string(message);
    // SAFETY: both pointers reference NUL-terminated strings that outlive the
    // call, and the fixed "%s" format consumes exactly one argument so the
    // message is never interpreted as a format string.
    unsafe { libc::syslog(severity.priority(), FORMAT.as_ptr(), text.as_ptr()) };
}

/// Close the channel before the process exits. Subsequent `send` calls
/// reopen it implicitly.
pub fn close() {
    // SAFETY: closelog takes no arguments and tolerates an unopened channel.
    unsafe { libc::closelog() };
}

/// Convert `text` to a C string, escaping interior NUL bytes instead of
/// truncating the record.
fn to_c_string(text: &str) -> CString {
    CString::new(text).unwrap_or_else(|_| {
        let escaped = text.replace('\0', "\\0");
        CString::new(escaped).unwrap_or_default()
    })
}
