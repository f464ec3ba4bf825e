//! Configuration loading for the jail daemon.
//!
//! The configuration is stored in `/etc/jaild/config.toml`. A missing file
//! leaves every value at its default. Values may be overridden by
//! environment variables using the `JAILD_` prefix and by command-line
//! flags.

use std::ffi::OsString;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default address the listeners bind to.
const DEFAULT_INTERFACE: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
/// Default port for plain connections.
const DEFAULT_PORT: u16 = 80;
/// Default number of consecutive accept failures tolerated per listener.
const DEFAULT_ACCEPT_RETRY_LIMIT: usize = 5;
/// Default minimum delay between accept retries in milliseconds.
const DEFAULT_ACCEPT_MIN_DELAY_MS: u64 = 100;

/// Runtime configuration for the daemon.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct Config {
    /// Address both listeners bind to.
    #[serde(default = "default_interface")]
    pub interface: IpAddr,
    /// Port for plain connections.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Port for connections the transport layer terminates TLS on.
    #[serde(default)]
    pub secure_port: Option<u16>,
    /// Consecutive accept failures tolerated before a listener gives up.
    #[serde(default = "default_accept_retry_limit")]
    pub accept_retry_limit: usize,
    /// Minimum delay in milliseconds applied between accept retries.
    #[serde(default = "default_accept_min_delay_ms")]
    pub accept_min_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE,
            port: DEFAULT_PORT,
            secure_port: None,
            accept_retry_limit: DEFAULT_ACCEPT_RETRY_LIMIT,
            accept_min_delay_ms: DEFAULT_ACCEPT_MIN_DELAY_MS,
        }
    }
}

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The command line could not be parsed.
    #[error(transparent)]
    Cli(#[from] clap::Error),
    /// The file or environment held invalid values.
    #[error("invalid configuration in {path}: {source}")]
    Invalid {
        /// Configuration file consulted.
        path: PathBuf,
        /// Underlying extraction error.
        #[source]
        source: Box<figment::Error>,
    },
}

/// Command-line arguments accepted by the daemon.
#[derive(Debug, Default, Clone, Parser)]
#[command(
    name = "jaild",
    version,
    about = "Jail service daemon",
    args_override_self = true
)]
pub struct CliArgs {
    /// Syslog verbosity, 0 (emergencies only) to 7 (debug).
    #[arg(short = 'd', value_name = "LEVEL", allow_hyphen_values = true)]
    pub debug_level: Option<String>,
    /// Path to the configuration file.
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = Config::DEFAULT_PATH,
        allow_hyphen_values = true
    )]
    pub config: PathBuf,
    /// Override the plain listener port.
    #[arg(long, allow_hyphen_values = true)]
    pub port: Option<u16>,
}

/// Flags that consume the following argument as their value.
const VALUE_FLAGS: [&str; 4] = ["-d", "-c", "--config", "--port"];
/// Flags that stand alone.
const SWITCHES: [&str; 4] = ["-h", "--help", "-V", "--version"];
/// Long flags also accepted in `--flag=value` form.
const INLINE_FLAGS: [&str; 2] = ["--config=", "--port="];

/// Keep only the arguments the daemon interprets, in order.
///
/// Anything else on the command line belongs to other components and is
/// skipped, along with a trailing value flag that has no value.
fn known_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args = args.into_iter().map(Into::into);
    let mut kept: Vec<OsString> = args.next().into_iter().collect();
    while let Some(arg) = args.next() {
        let Some(text) = arg.to_str() else {
            continue;
        };
        if VALUE_FLAGS.contains(&text) {
            if let Some(value) = args.next() {
                kept.push(arg);
                kept.push(value);
            }
        } else if SWITCHES.contains(&text) || INLINE_FLAGS.iter().any(|f| text.starts_with(f)) {
            kept.push(arg);
        }
    }
    kept
}

impl CliArgs {
    /// Parse arguments from `args`, the first of which is the program name.
    ///
    /// Unrecognised arguments are ignored and a `-d` without a value reads
    /// as absent.
    ///
    /// # Errors
    /// Returns the clap error for malformed values of recognised flags, and
    /// for `--help`/`--version`, which callers display rather than treat as
    /// failures.
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(known_args(args))
    }
}

fn default_interface() -> IpAddr {
    DEFAULT_INTERFACE
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_accept_retry_limit() -> usize {
    DEFAULT_ACCEPT_RETRY_LIMIT
}

fn default_accept_min_delay_ms() -> u64 {
    DEFAULT_ACCEPT_MIN_DELAY_MS
}

impl Config {
    /// Default location of the daemon configuration file.
    pub const DEFAULT_PATH: &'static str = "/etc/jaild/config.toml";

    /// Load the configuration named by `args`, merging `JAILD_*`
    /// environment variables and command-line overrides over file values.
    ///
    /// # Errors
    /// Returns an error if the file or environment hold values of the wrong
    /// type.
    pub fn load(args: &CliArgs) -> Result<Self, ConfigError> {
        Self::from_file_with_cli(&args.config, args)
    }

    /// Load the configuration from `path` without command-line overrides.
    ///
    /// # Errors
    /// Returns an error if the file or environment hold values of the wrong
    /// type.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_file_with_cli(path, &CliArgs::default())
    }

    fn from_file_with_cli(path: &Path, cli: &CliArgs) -> Result<Self, ConfigError> {
        let mut cfg: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("JAILD_").split("__"))
            .extract()
            .map_err(|source| ConfigError::Invalid {
                path: path.to_path_buf(),
                source: Box::new(source),
            })?;

        if let Some(port) = cli.port {
            cfg.port = port;
        }
        Ok(cfg)
    }

    /// Address of the plain listener.
    #[must_use]
    pub fn plain_addr(&self) -> SocketAddr {
        SocketAddr::new(self.interface, self.port)
    }

    /// Address of the secure listener, when one is configured.
    #[must_use]
    pub fn secure_addr(&self) -> Option<SocketAddr> {
        self.secure_port
            .map(|port| SocketAddr::new(self.interface, port))
    }
}
