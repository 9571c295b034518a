//! Peer Connections
//!
//! A [`Connection`] is one open TCP stream to a remote peer. The stream is
//! split when the connection is opened:
//!
//! ```text
//!                 TcpStream::into_split()
//!                 ┌──────────┴───────────┐
//!                 ▼                      ▼
//!          OwnedReadHalf           OwnedWriteHalf
//!      (moved into the handler)   (kept in Connection, shared
//!                                  through the Registry)
//! ```
//!
//! The handler task owns the read half and therefore the lifetime of the
//! connection. Everyone else (the broadcaster, close-all on shutdown) only
//! ever touches the write half and the close signal.

use crate::registry::RegistryEntry;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};

/// Source of process-unique connection ids.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Which side opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Accepted by our listener
    Inbound,
    /// Dialed by us
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => write!(f, "inbound"),
            Direction::Outbound => write!(f, "outbound"),
        }
    }
}

/// An open byte stream to one remote peer.
pub struct Connection {
    /// Process-unique id (registry key)
    id: u64,

    /// Remote address, used for display and logging
    addr: SocketAddr,

    /// Who opened the connection
    direction: Direction,

    /// Write half, serialized so concurrent sends never interleave
    writer: Mutex<OwnedWriteHalf>,

    /// Flipped to `true` once a local close has been requested
    closed_tx: watch::Sender<bool>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("direction", &self.direction)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    /// Wraps a freshly accepted or dialed stream.
    ///
    /// Returns the connection together with the read half, which must be
    /// handed to exactly one [`ConnectionHandler`](super::ConnectionHandler).
    pub fn open(
        stream: TcpStream,
        addr: SocketAddr,
        direction: Direction,
    ) -> (Self, OwnedReadHalf) {
        let (reader, writer) = stream.into_split();
        let (closed_tx, _) = watch::channel(false);

        let connection = Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            addr,
            direction,
            writer: Mutex::new(writer),
            closed_tx,
        };

        (connection, reader)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }

    /// Writes the whole buffer to the peer.
    ///
    /// No delimiter or length prefix is added: the peer sees raw bytes and
    /// may receive several sends coalesced into one read (or one send split
    /// over several).
    pub async fn send(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await
    }

    /// Closes the connection.
    ///
    /// Signals the handler to stop reading and shuts down the write side so
    /// the peer sees end-of-stream. Only the first call does any work.
    pub async fn close(&self) -> std::io::Result<()> {
        if self.closed_tx.send_replace(true) {
            return Ok(());
        }
        let mut writer = self.writer.lock().await;
        writer.shutdown().await
    }

    /// Resolves once a local close has been requested.
    pub async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        // The sender lives in `self`, so this can only fail after drop
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl RegistryEntry for Connection {
    fn entry_id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

/// Counters shared by every component of a peer.
#[derive(Debug, Default)]
pub struct PeerStats {
    /// Connections accepted by the listener
    pub inbound_accepted: AtomicU64,
    /// Connections opened by the dialer
    pub outbound_dialed: AtomicU64,
    /// Handlers currently running
    pub active_connections: AtomicU64,
    /// Total bytes received from peers
    pub bytes_read: AtomicU64,
    /// Total bytes written to peers
    pub bytes_written: AtomicU64,
    /// Operator lines fanned out by the broadcaster
    pub lines_broadcast: AtomicU64,
}

impl PeerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self, direction: Direction) {
        match direction {
            Direction::Inbound => self.inbound_accepted.fetch_add(1, Ordering::Relaxed),
            Direction::Outbound => self.outbound_dialed.fetch_add(1, Ordering::Relaxed),
        };
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn line_broadcast(&self) {
        self.lines_broadcast.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }
}
