//! Connection Handler Module
//!
//! Every accepted or dialed connection gets its own handler task. The
//! handler owns the read half of the stream and runs until the peer goes
//! away or a local close is requested.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Listener accepts / Dialer connects
//!        │
//!        ▼
//! 2. spawn_handler(): Registry::add + task spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read next chunk         │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Decode + emit message   │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. EOF / reset / error / local close
//!        │
//!        ▼
//! 5. Registry::remove + Connection::close, task ends
//! ```
//!
//! ## No Framing
//!
//! Each successful read is one display event. TCP is a stream protocol, so
//! one operator line may arrive split over two reads, or two lines may
//! arrive in one. This is a property of the raw wire format, not something
//! the handler tries to repair.

use super::peer::{Connection, Direction, PeerStats};
use crate::registry::Registry;
use crate::READ_CHUNK_SIZE;
use bytes::BytesMut;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Something worth showing the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A connection was accepted or dialed
    Connected { addr: SocketAddr, direction: Direction },
    /// One chunk of text arrived from a peer
    Message { from: SocketAddr, text: String },
    /// A handler finished and its connection is gone
    Disconnected { addr: SocketAddr },
}

/// Shared state handed to the listener, dialer and every handler.
#[derive(Debug, Clone)]
pub struct PeerContext {
    pub registry: Arc<Registry>,
    pub stats: Arc<PeerStats>,
    pub events: mpsc::UnboundedSender<PeerEvent>,
}

impl PeerContext {
    /// Creates a context with an empty registry, returning the receiving
    /// end of the event channel alongside it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PeerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let ctx = Self {
            registry: Arc::new(Registry::new()),
            stats: Arc::new(PeerStats::new()),
            events,
        };
        (ctx, rx)
    }

    /// Emits an event. A missing receiver just means nobody is watching.
    pub fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(event);
    }
}

/// Reads from a single peer until the stream ends.
pub struct ConnectionHandler {
    /// Read half of the stream (this handler owns it)
    reader: OwnedReadHalf,

    /// The connection as seen by the registry
    connection: Arc<Connection>,

    /// Buffer for the chunk being read
    buffer: BytesMut,

    ctx: PeerContext,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `reader` - The read half returned by [`Connection::open`]
    /// * `connection` - The connection it belongs to
    /// * `ctx` - Shared registry, stats and event channel
    pub fn new(reader: OwnedReadHalf, connection: Arc<Connection>, ctx: PeerContext) -> Self {
        ctx.stats.connection_opened(connection.direction());

        Self {
            reader,
            connection,
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
            ctx,
        }
    }

    /// Runs the read loop, then tears the connection down.
    ///
    /// Teardown is unconditional: whatever ended the loop, the connection is
    /// removed from the registry and closed. There is no reconnect.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        let addr = self.connection.addr();
        debug!(peer = %addr, direction = %self.connection.direction(), "Handler started");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => debug!(peer = %addr, "Connection closed locally"),
            Err(ConnectionError::PeerClosed) => info!(peer = %addr, "Connection closed by peer"),
            Err(ConnectionError::Io(e)) if e.kind() == ErrorKind::ConnectionReset => {
                info!(peer = %addr, "Connection reset by peer")
            }
            Err(e) => warn!(peer = %addr, error = %e, "Connection error"),
        }

        self.teardown().await;
        result
    }

    /// The read-decode-emit loop.
    ///
    /// Returns `Ok(())` when a local close was requested.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        let Self {
            reader,
            connection,
            buffer,
            ctx,
        } = self;

        loop {
            buffer.clear();

            let read = tokio::select! {
                biased;
                _ = connection.closed() => return Ok(()),
                result = reader.read_buf(&mut *buffer) => result,
            };

            match read {
                Ok(0) => return Err(ConnectionError::PeerClosed),
                Ok(n) => {
                    ctx.stats.bytes_read(n);
                    let text = String::from_utf8_lossy(&buffer[..n]).into_owned();
                    trace!(peer = %connection.addr(), bytes = n, "Read chunk");
                    debug!(peer = %connection.addr(), "Received: {}", text);
                    ctx.emit(PeerEvent::Message {
                        from: connection.addr(),
                        text,
                    });
                }
                Err(e) if is_transient(&e) => {
                    debug!(peer = %connection.addr(), error = %e, "Read timed out, still connected");
                }
                Err(e) => return Err(ConnectionError::Io(e)),
            }
        }
    }

    async fn teardown(&mut self) {
        let addr = self.connection.addr();

        self.ctx.registry.remove(&self.connection);

        if let Err(e) = self.connection.close().await {
            // The peer may already have torn the socket down
            debug!(peer = %addr, error = %e, "Error closing connection");
        }

        self.ctx.stats.connection_closed();
        self.ctx.emit(PeerEvent::Disconnected { addr });
    }
}

/// Read errors that leave the connection usable.
fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

/// Why a handler stopped reading.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (reset, broken pipe, ...)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed its write side
    #[error("Connection closed by peer")]
    PeerClosed,
}

/// Registers a new stream and starts its handler task.
///
/// This is the single entry point used by both the listener and the dialer:
/// the connection is added to the registry before the handler starts, so a
/// broadcast issued right after accept/dial already reaches it.
pub fn spawn_handler(
    stream: TcpStream,
    addr: SocketAddr,
    direction: Direction,
    ctx: &PeerContext,
) -> Arc<Connection> {
    let (connection, reader) = Connection::open(stream, addr, direction);
    let connection = Arc::new(connection);

    ctx.registry.add(Arc::clone(&connection));
    ctx.emit(PeerEvent::Connected { addr, direction });

    let handler = ConnectionHandler::new(reader, Arc::clone(&connection), ctx.clone());
    tokio::spawn(async move {
        let _ = handler.run().await;
    });

    connection
}
