//! Test helpers for managing environment variables.
//!
//! [`EnvVarGuard`] changes one variable and [`ScrubbedEnv`] clears every
//! variable under a prefix; both restore the previous values on drop.
//! Callers must run serially (`#[serial_test::serial]`).

use std::ffi::OsString;

/// Changes a single environment variable for the guard's lifetime.
#[derive(Debug)]
pub struct EnvVarGuard {
    key: String,
    original: Option<OsString>,
}

impl EnvVarGuard {
    /// Set `key` to `value` until the guard drops.
    pub fn set(key: &str, value: &str) -> Self {
        let original = std::env::var_os(key);
        set_env_var(key, value);
        Self {
            key: key.to_owned(),
            original,
        }
    }

    /// Remove `key` until the guard drops.
    pub fn remove(key: &str) -> Self {
        let original = std::env::var_os(key);
        remove_env_var(key);
        Self {
            key: key.to_owned(),
            original,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        restore(&self.key, self.original.as_ref());
    }
}

/// Removes every variable whose name starts with a prefix, so ambient
/// `JAILD_*` settings cannot leak into configuration tests.
#[derive(Debug)]
pub struct ScrubbedEnv {
    removed: Vec<(String, OsString)>,
}

impl ScrubbedEnv {
    /// Remove all variables starting with `prefix` until the guard drops.
    pub fn new(prefix: &str) -> Self {
        let removed: Vec<(String, OsString)> = std::env::vars_os()
            .filter_map(|(key, value)| key.into_string().ok().map(|k| (k, value)))
            .filter(|(key, _)| key.starts_with(prefix))
            .collect();
        for (key, _) in &removed {
            remove_env_var(key);
        }
        Self { removed }
    }
}

impl Drop for ScrubbedEnv {
    fn drop(&mut self) {
        for (key, value) in &self.removed {
            restore(key, Some(value));
        }
    }
}

fn restore(key: &str, value: Option<&OsString>) {
    match value {
        // SAFETY: guards are only used from serial test contexts.
        Some(v) => unsafe { std::env::set_var(key, v) },
        None => remove_env_var(key),
    }
}

/// SAFETY: Must only be called from serial test contexts.
fn set_env_var(key: &str, value: &str) {
    unsafe { std::env::set_var(key, value) };
}

/// SAFETY: Must only be called from serial test contexts.
fn remove_env_var(key: &str) {
    unsafe { std::env::remove_var(key) };
}
