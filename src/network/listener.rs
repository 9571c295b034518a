//! Inbound Listener
//!
//! Binds the peer's listening socket and runs the accept loop as a
//! background task.
//!
//! ## Accept Errors
//!
//! Accept failures fall into two groups:
//!
//! - **Per-connection** (`ConnectionAborted`, `ConnectionReset`,
//!   `Interrupted`, `WouldBlock`, `TimedOut`): one pending connection went
//!   bad before we got to it. Logged, and the loop keeps accepting.
//! - **Everything else**: the listening socket itself is unusable (closed,
//!   out of descriptors, ...). The loop stops and is not restarted; the rest
//!   of the peer keeps running.

use crate::connection::{spawn_handler, Direction, PeerContext};
use crate::LISTEN_BACKLOG;
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A bound listening socket that has not started accepting yet.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
    ctx: PeerContext,
}

impl Listener {
    /// Binds to `host:port` with address reuse enabled.
    ///
    /// Port `0` picks an ephemeral port; use [`local_addr`](Self::local_addr)
    /// to find out which.
    pub async fn bind(host: &str, port: u16, ctx: PeerContext) -> Result<Self, ListenerError> {
        let addr = tokio::net::lookup_host((host, port))
            .await
            .map_err(|source| ListenerError::Resolve {
                host: host.to_string(),
                source,
            })?
            .next()
            .ok_or_else(|| ListenerError::NoAddress {
                host: host.to_string(),
            })?;

        let bind_err = |source| ListenerError::Bind { addr, source };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;

        // Lets a restarted peer take its port back while old sockets linger
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;

        let inner = socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;
        let local_addr = inner.local_addr().map_err(bind_err)?;

        Ok(Self {
            inner,
            local_addr,
            ctx,
        })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts the accept loop as a background task.
    ///
    /// The returned handle stops the loop when dropped.
    pub fn start(self) -> ListenerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let local_addr = self.local_addr;

        let task = tokio::spawn(self.accept_loop(shutdown_rx));

        ListenerHandle {
            local_addr,
            shutdown_tx,
            task,
        }
    }

    /// Accepts connections until stopped or the socket becomes unusable.
    async fn accept_loop(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(port = self.local_addr.port(), "Listening for peers on {}", self.local_addr);

        loop {
            let accepted = tokio::select! {
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        debug!(port = self.local_addr.port(), "Listener received shutdown signal");
                        return;
                    }
                    continue;
                }
                accepted = self.inner.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    debug!(peer = %addr, "Accepted connection");
                    spawn_handler(stream, addr, Direction::Inbound, &self.ctx);
                }
                Err(e) if is_per_connection(&e) => {
                    warn!(port = self.local_addr.port(), error = %e, "Failed to accept connection");
                }
                Err(e) => {
                    error!(
                        port = self.local_addr.port(),
                        error = %e,
                        "Listening socket unusable, no longer accepting"
                    );
                    return;
                }
            }
        }
    }
}

/// Accept errors that only affect one pending connection.
fn is_per_connection(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
    )
}

/// A handle to a running accept loop.
///
/// When this handle is dropped, the accept loop is stopped and the
/// listening socket closed. Connections already accepted are unaffected.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns false once the accept loop has exited.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the accept loop.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!(port = self.local_addr.port(), "Listener stopped");
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Binds and starts a listener, logging instead of failing.
///
/// A bind failure only disables inbound connections: the error is logged,
/// `None` is returned, and the caller carries on (dialing out still works).
pub async fn start_listener(host: &str, port: u16, ctx: PeerContext) -> Option<ListenerHandle> {
    match Listener::bind(host, port, ctx).await {
        Ok(listener) => Some(listener.start()),
        Err(e) => {
            error!(port = port, error = %e, "Failed to set up listener");
            None
        }
    }
}

/// Errors raised while setting up the listening socket.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Host name lookup failed
    #[error("Cannot resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Host resolved to nothing
    #[error("No address found for {host}")]
    NoAddress { host: String },

    /// Socket creation, bind or listen failed
    #[error("Cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::PeerEvent;
    use crate::network::Dialer;
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio::sync::mpsc;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<PeerEvent>) -> PeerEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_dialer_message_reaches_listener() {
        let (listen_ctx, mut listen_events) = PeerContext::new();
        let (dial_ctx, _dial_events) = PeerContext::new();

        let handle = start_listener("127.0.0.1", 0, listen_ctx.clone())
            .await
            .expect("listener should start");
        let port = handle.local_addr().port();

        let outbound = Dialer::new(dial_ctx.clone())
            .dial("127.0.0.1", port)
            .await
            .expect("dial should succeed");

        match next_event(&mut listen_events).await {
            PeerEvent::Connected { direction, .. } => assert_eq!(direction, Direction::Inbound),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(listen_ctx.registry.len(), 1);

        outbound.send(b"hello").await.unwrap();

        match next_event(&mut listen_events).await {
            PeerEvent::Message { text, .. } => assert_eq!(text, "hello"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_accepts_multiple_peers() {
        let (ctx, mut events) = PeerContext::new();
        let handle = start_listener("127.0.0.1", 0, ctx.clone()).await.unwrap();

        let _a = TcpStream::connect(handle.local_addr()).await.unwrap();
        let _b = TcpStream::connect(handle.local_addr()).await.unwrap();

        let _ = next_event(&mut events).await;
        let _ = next_event(&mut events).await;

        assert_eq!(ctx.registry.len(), 2);
        assert!(handle.is_running());
    }

    #[tokio::test]
    async fn test_bind_failure_returns_none() {
        let (ctx, _events) = PeerContext::new();
        let first = start_listener("127.0.0.1", 0, ctx.clone()).await.unwrap();
        let port = first.local_addr().port();

        // Port is held by a listening socket
        assert!(start_listener("127.0.0.1", port, ctx.clone()).await.is_none());

        let err = Listener::bind("127.0.0.1", port, ctx).await.unwrap_err();
        assert!(matches!(err, ListenerError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_stop_closes_listening_socket() {
        let (ctx, _events) = PeerContext::new();
        let handle = start_listener("127.0.0.1", 0, ctx).await.unwrap();
        let addr = handle.local_addr();

        handle.stop();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while handle.is_running() {
            assert!(tokio::time::Instant::now() < deadline, "listener did not stop");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[test]
    fn test_per_connection_errors() {
        use std::io::Error;

        assert!(is_per_connection(&Error::from(ErrorKind::ConnectionAborted)));
        assert!(is_per_connection(&Error::from(ErrorKind::Interrupted)));
        assert!(!is_per_connection(&Error::from(ErrorKind::InvalidInput)));
        assert!(!is_per_connection(&Error::from(ErrorKind::Other)));
    }
}
