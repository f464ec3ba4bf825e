//! Entry point for the jaild daemon binary.
//!
//! Configures syslog verbosity from `-d <level>`, installs the SIGTERM
//! listener, binds the sockets and hands the daemon to the lifecycle
//! controller. Its exit status becomes the process exit code.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::error::ErrorKind;
use jail_lib::ExitStatus;
use jaild::config::{CliArgs, Config, ConfigError};
use jaild::daemon::Daemon;
use jaild::failure::DaemonFailure;
use jaild::handler::UnavailableHandler;
use jaild::shutdown::ShutdownToken;
use jaild::{diagnostics, lifecycle, syslog};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match CliArgs::try_parse_args(std::env::args_os()) {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            // Nothing useful can be done if stdout is gone.
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            diagnostics::configure(None);
            let status = startup_failure(ConfigError::from(e));
            syslog::close();
            return status.into();
        }
    };
    diagnostics::configure(args.debug_level.as_deref());

    let shutdown = ShutdownToken::new();
    let status = match lifecycle::arm(&shutdown) {
        Ok(_sigterm) => start(&args, shutdown).await,
        Err(failure) => lifecycle::startup_failure(&failure, &mut io::stderr()),
    };
    syslog::close();
    status.into()
}

/// Load the configuration, bind the sockets and run the daemon.
async fn start(args: &CliArgs, shutdown: ShutdownToken) -> ExitStatus {
    let config = match Config::load(args) {
        Ok(config) => config,
        Err(e) => return startup_failure(e),
    };
    let daemon = match Daemon::bind(&config, shutdown.clone(), UnavailableHandler).await {
        Ok(daemon) => daemon,
        Err(e) => return startup_failure(e),
    };
    lifecycle::run(Arc::new(daemon), &shutdown, &mut io::stderr()).await
}

fn startup_failure(error: impl std::error::Error) -> ExitStatus {
    let failure = DaemonFailure::message(error.to_string());
    lifecycle::startup_failure(&failure, &mut io::stderr())
}
