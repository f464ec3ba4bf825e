//! Scripted services for exercising the lifecycle controller.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use jaild::failure::{CloseError, DaemonFailure};
use jaild::service::Service;
use jaild::shutdown::ShutdownToken;

/// What the scripted service loop does when run.
#[derive(Debug)]
pub enum Script {
    /// Return immediately without failing.
    Return,
    /// Fail with the given failure.
    Fail(DaemonFailure),
    /// Panic with the given message.
    Panic(&'static str),
    /// Block until the token is triggered, then return.
    WaitFor(ShutdownToken),
}

/// Service whose loop follows a [`Script`] and which counts socket closures.
#[derive(Debug)]
pub struct ScriptedService {
    script: Mutex<Option<Script>>,
    closes: AtomicUsize,
    fail_close: bool,
}

impl ScriptedService {
    /// Service running `script` once.
    #[must_use]
    pub fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            closes: AtomicUsize::new(0),
            fail_close: false,
        }
    }

    /// Make every `close_sockets` call fail.
    #[must_use]
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Number of `close_sockets` calls so far.
    #[must_use]
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Service for ScriptedService {
    async fn serve(&self) -> Result<(), DaemonFailure> {
        let script = self
            .script
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .ok_or(DaemonFailure::Literal("script already consumed"))?;
        match script {
            Script::Return => Ok(()),
            Script::Fail(failure) => Err(failure),
            Script::Panic(message) => panic!("{message}"),
            Script::WaitFor(token) => {
                token.triggered().await;
                Ok(())
            }
        }
    }

    fn close_sockets(&self) -> Result<(), CloseError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            Err(CloseError::Poisoned)
        } else {
            Ok(())
        }
    }
}
