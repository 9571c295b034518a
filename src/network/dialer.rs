//! Outbound Dialer
//!
//! Opens one connection to another peer. There is no retry: a refused or
//! timed-out attempt is reported once and the registry is left untouched.

use crate::connection::{spawn_handler, Connection, Direction, PeerContext};
use crate::DEFAULT_CONNECT_TIMEOUT;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Dials other peers on behalf of one chat node.
#[derive(Debug, Clone)]
pub struct Dialer {
    ctx: PeerContext,
    connect_timeout: Duration,
}

impl Dialer {
    /// Creates a dialer with the default connect timeout.
    pub fn new(ctx: PeerContext) -> Self {
        Self {
            ctx,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the bound on a single connect attempt.
    pub fn with_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Connects to `host:port`, registers the connection and starts its
    /// handler.
    pub async fn connect(&self, host: &str, port: u16) -> Result<Arc<Connection>, DialError> {
        let target = format!("{}:{}", host, port);

        let attempt = TcpStream::connect((host, port));
        let stream = match tokio::time::timeout(self.connect_timeout, attempt).await {
            Err(_) => return Err(DialError::TimedOut { target }),
            Ok(Err(e)) => return Err(DialError::from_io(target, e)),
            Ok(Ok(stream)) => stream,
        };

        let addr = stream
            .peer_addr()
            .map_err(|e| DialError::from_io(target.clone(), e))?;

        debug!(peer = %addr, "Connected to peer at {}", target);
        Ok(spawn_handler(stream, addr, Direction::Outbound, &self.ctx))
    }

    /// Like [`connect`](Self::connect), but logs the failure and returns
    /// `None` instead of an error.
    pub async fn dial(&self, host: &str, port: u16) -> Option<Arc<Connection>> {
        match self.connect(host, port).await {
            Ok(connection) => Some(connection),
            Err(e @ DialError::Refused { .. }) => {
                warn!(error = %e, "Is the other peer listening?");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect");
                None
            }
        }
    }
}

/// Why an outbound connection could not be opened.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    /// Nothing is listening at the target
    #[error("Connection refused by {target}")]
    Refused { target: String },

    /// The attempt did not complete within the connect timeout
    #[error("Connection to {target} timed out")]
    TimedOut { target: String },

    /// Any other failure (resolution, unreachable network, ...)
    #[error("Error connecting to {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

impl DialError {
    fn from_io(target: String, source: std::io::Error) -> Self {
        match source.kind() {
            ErrorKind::ConnectionRefused => DialError::Refused { target },
            ErrorKind::TimedOut => DialError::TimedOut { target },
            _ => DialError::Io { target, source },
        }
    }
}
