//! Test support utilities for the jail daemon.

pub mod env_guard;
pub mod logging;
pub mod service;
pub mod util;

pub use logging::RecordingSink;
pub use service::{Script, ScriptedService};
pub use util::{CONNECT_RETRY_COUNT, CONNECT_RETRY_DELAY, loopback_config, wait_until_refused};
