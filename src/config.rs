//! Command-Line Configuration
//!
//! Everything is optional. Without `--port` the operator is asked for an
//! instance number at startup.

use crate::console::input::{parse_listen_port, InputError, PeerAddress};
use crate::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_HOST};
use std::time::Duration;

/// Peer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to listen on
    pub host: String,
    /// Port to listen on (prompted for when absent)
    pub port: Option<u16>,
    /// Peers to dial right after startup
    pub peers: Vec<PeerAddress>,
    /// Bound on each outbound connect attempt
    pub connect_timeout: Duration,
    /// Log at debug level
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: None,
            peers: Vec::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            verbose: false,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Run(Config),
    Help,
    Version,
}

impl Config {
    /// Parses configuration from command-line arguments (without the
    /// program name).
    pub fn from_args<I>(args: I) -> Result<CliAction, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Config::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let mut value = |flag: &'static str| args.next().ok_or(ConfigError::MissingValue(flag));

            match arg.as_str() {
                "--host" | "-h" => config.host = value("--host")?,
                "--port" | "-p" => {
                    config.port = Some(parse_listen_port(&value("--port")?)?);
                }
                "--connect" | "-c" => config.peers.push(value("--connect")?.parse()?),
                "--connect-timeout" => {
                    let raw = value("--connect-timeout")?;
                    let secs: u64 = raw
                        .parse()
                        .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
                    if secs == 0 {
                        return Err(ConfigError::InvalidTimeout(raw));
                    }
                    config.connect_timeout = Duration::from_secs(secs);
                }
                "--verbose" => config.verbose = true,
                "--help" => return Ok(CliAction::Help),
                "--version" | "-v" => return Ok(CliAction::Version),
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        Ok(CliAction::Run(config))
    }

    /// Returns the bind address for the given port as a string
    pub fn bind_address(&self, port: u16) -> String {
        format!("{}:{}", self.host, port)
    }
}

/// Invalid command line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(&'static str),

    #[error("Unknown argument: {0}")]
    UnknownArgument(String),

    #[error("Invalid connect timeout '{0}' (whole seconds, at least 1)")]
    InvalidTimeout(String),

    #[error(transparent)]
    Input(#[from] InputError),
}
