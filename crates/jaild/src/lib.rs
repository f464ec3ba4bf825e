#![cfg_attr(docsrs, feature(doc_cfg))]

//! Library components for the jail daemon.
//!
//! # Overview
//! This crate exposes:
//! - [`diagnostics::configure`]: maps the `-d <level>` token onto the
//!   system log mask and installs logging.
//! - [`lifecycle::run`]: drives a [`service::Service`] from start to a
//!   single exit status, closing its sockets on every path.
//! - [`daemon::Daemon`]: the service owning the listening sockets.
//!
//! # Examples
//! ```rust,no_run
//! use std::sync::Arc;
//! use jaild::config::{CliArgs, Config};
//! use jaild::daemon::Daemon;
//! use jaild::handler::UnavailableHandler;
//! use jaild::shutdown::ShutdownToken;
//!
//! # async fn docs() -> anyhow::Result<()> {
//! let shutdown = ShutdownToken::new();
//! let _sigterm = jaild::lifecycle::arm(&shutdown)?;
//! let cfg = Config::load(&CliArgs::default())?;
//! let daemon = Daemon::bind(&cfg, shutdown.clone(), UnavailableHandler).await?;
//! let status = jaild::lifecycle::run(Arc::new(daemon), &shutdown, &mut std::io::stderr()).await;
//! println!("exit code {}", status.code());
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod daemon;
pub mod diagnostics;
pub mod failure;
pub mod handler;
pub mod lifecycle;
pub mod listener;
pub mod logging;
pub mod service;
pub mod shutdown;
pub mod syslog;
