//! Broadcaster
//!
//! Runs on the main task. Reads operator lines and writes each one to every
//! registered connection.
//!
//! ## Loop
//!
//! ```text
//!   next_line() ──┬── "exit" / EOF / Ctrl+C ──> clear_and_take + close all
//!                 │
//!                 └── text ──> snapshot ──┬── empty: "no peers"
//!                                         └── send to each peer
//! ```
//!
//! A failed write is logged and nothing else: the connection stays in the
//! registry until its handler notices the dead stream on the read side.
//! A write that blocks (the peer stopped reading) is abandoned on Ctrl+C.

use super::input::is_exit_keyword;
use super::interrupt::Interrupt;
use crate::connection::{PeerContext, PeerStats};
use crate::registry::Registry;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, Lines};
use tracing::{debug, info, warn};

/// Outcome of fanning one line out to the registered peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Peers the line was written to
    pub delivered: usize,
    /// Peers whose write failed
    pub failed: usize,
}

impl BroadcastReport {
    /// Number of write attempts made.
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Why the broadcast loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Operator typed the exit keyword (or picked exit at the menu)
    ExitKeyword,
    /// Console input reached end of file
    EndOfInput,
    /// Ctrl+C
    Interrupted,
}

/// Fans operator lines out to every registered connection.
#[derive(Debug)]
pub struct Broadcaster {
    registry: Arc<Registry>,
    stats: Arc<PeerStats>,
    prompt: Option<String>,
}

impl Broadcaster {
    pub fn new(ctx: &PeerContext) -> Self {
        Self {
            registry: Arc::clone(&ctx.registry),
            stats: Arc::clone(&ctx.stats),
            prompt: None,
        }
    }

    /// Prints `prompt` before every line is read.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Writes `line` to every peer in a snapshot of the registry.
    ///
    /// The bytes go out exactly as typed, without a trailing newline.
    pub async fn broadcast(&self, line: &str) -> BroadcastReport {
        let peers = self.registry.snapshot();
        let mut report = BroadcastReport::default();

        if peers.is_empty() {
            info!("No connected peers to send message to");
            return report;
        }

        for peer in &peers {
            match peer.send(line.as_bytes()).await {
                Ok(()) => {
                    self.stats.bytes_written(line.len());
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(peer = %peer.addr(), error = %e, "Failed to send to peer");
                    report.failed += 1;
                }
            }
        }

        self.stats.line_broadcast();
        debug!(
            delivered = report.delivered,
            failed = report.failed,
            "Line broadcast"
        );
        report
    }

    /// Empties the registry and closes every connection it held.
    ///
    /// Close failures are logged and skipped. Returns the number of
    /// connections a close was attempted on.
    pub async fn close_all(&self) -> usize {
        let peers = self.registry.clear_and_take();

        for peer in &peers {
            if let Err(e) = peer.close().await {
                warn!(peer = %peer.addr(), error = %e, "Error while closing a connection");
            }
        }

        info!(closed = peers.len(), "Closed all connections");
        peers.len()
    }

    /// Reads lines until exit, end of input or interrupt, broadcasting each.
    ///
    /// Whatever stops the loop, every connection is closed before this
    /// returns.
    pub async fn run<R>(&self, lines: &mut Lines<R>, interrupt: &mut Interrupt) -> StopReason
    where
        R: AsyncBufRead + Unpin,
    {
        let reason = loop {
            self.show_prompt();

            let next = tokio::select! {
                biased;
                _ = interrupt.triggered() => break StopReason::Interrupted,
                next = lines.next_line() => next,
            };

            match next {
                Ok(Some(line)) if is_exit_keyword(&line) => break StopReason::ExitKeyword,
                Ok(Some(line)) => {
                    // A peer that stops reading can stall the write indefinitely
                    tokio::select! {
                        biased;
                        _ = interrupt.triggered() => break StopReason::Interrupted,
                        _ = self.broadcast(&line) => {}
                    }
                }
                Ok(None) => break StopReason::EndOfInput,
                Err(e) => {
                    warn!(error = %e, "Failed to read console input");
                    break StopReason::EndOfInput;
                }
            }
        };

        info!(reason = ?reason, "Closing all connections");
        self.close_all().await;
        reason
    }

    fn show_prompt(&self) {
        if let Some(prompt) = &self.prompt {
            let mut stdout = std::io::stdout();
            let _ = write!(stdout, "{}", prompt);
            let _ = stdout.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{spawn_handler, Connection, Direction};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    /// Registers a connection (with a running handler) and returns the
    /// remote end of it.
    async fn connect_peer(ctx: &PeerContext) -> TcpStream {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let stream = TcpStream::connect(addr).await.unwrap();
        let (remote, _) = listener.accept().await.unwrap();
        spawn_handler(stream, addr, Direction::Outbound, ctx);

        remote
    }

    async fn read_to_end(stream: &mut TcpStream) -> Vec<u8> {
        let mut received = Vec::new();
        tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut received))
            .await
            .expect("peer was not closed")
            .unwrap();
        received
    }

    fn mock_lines(input: &[u8]) -> Lines<BufReader<tokio_test::io::Mock>> {
        let mock = tokio_test::io::Builder::new().read(input).build();
        BufReader::new(mock).lines()
    }

    fn never() -> Interrupt {
        Interrupt::new().1
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_registry() {
        let (ctx, _events) = PeerContext::new();
        let broadcaster = Broadcaster::new(&ctx);

        let report = broadcaster.broadcast("hello").await;

        assert_eq!(report.attempted(), 0);
        assert_eq!(ctx.stats.lines_broadcast.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_peer() {
        let (ctx, _events) = PeerContext::new();
        let mut a = connect_peer(&ctx).await;
        let mut b = connect_peer(&ctx).await;
        let broadcaster = Broadcaster::new(&ctx);

        let report = broadcaster.broadcast("hi all").await;
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 0);

        for remote in [&mut a, &mut b] {
            let mut buf = [0u8; 16];
            let n = remote.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"hi all");
        }

        assert_eq!(ctx.stats.bytes_written.load(Ordering::Relaxed), 12);
        assert_eq!(ctx.stats.lines_broadcast.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_connection_registered() {
        let (ctx, _events) = PeerContext::new();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = TcpStream::connect(addr).await.unwrap();
        let (_remote, _) = listener.accept().await.unwrap();

        // No handler: the write side is shut down but nothing deregisters it
        let (connection, _reader) = Connection::open(stream, addr, Direction::Outbound);
        let connection = Arc::new(connection);
        ctx.registry.add(Arc::clone(&connection));
        connection.close().await.unwrap();

        let report = Broadcaster::new(&ctx).broadcast("lost").await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 0);
        assert!(ctx.registry.contains(&connection));
    }

    #[tokio::test]
    async fn test_exit_keyword_closes_all() {
        let (ctx, _events) = PeerContext::new();
        let mut a = connect_peer(&ctx).await;
        let mut b = connect_peer(&ctx).await;
        assert_eq!(ctx.registry.len(), 2);

        let mut lines = mock_lines(b"exit\n");
        let reason = Broadcaster::new(&ctx).run(&mut lines, &mut never()).await;

        assert_eq!(reason, StopReason::ExitKeyword);
        assert!(ctx.registry.is_empty());

        // Both peers observe the close
        assert!(read_to_end(&mut a).await.is_empty());
        assert!(read_to_end(&mut b).await.is_empty());
    }

    #[tokio::test]
    async fn test_lines_are_sent_until_exit() {
        let (ctx, _events) = PeerContext::new();
        let mut remote = connect_peer(&ctx).await;

        let mut lines = mock_lines(b"hello\nworld\nEXIT\n");
        let reason = Broadcaster::new(&ctx).run(&mut lines, &mut never()).await;

        assert_eq!(reason, StopReason::ExitKeyword);
        // No framing: both lines arrive back to back
        assert_eq!(read_to_end(&mut remote).await, b"helloworld");
    }

    #[tokio::test]
    async fn test_end_of_input_closes_all() {
        let (ctx, _events) = PeerContext::new();
        let mut remote = connect_peer(&ctx).await;

        let mut lines = mock_lines(b"bye");
        let reason = Broadcaster::new(&ctx).run(&mut lines, &mut never()).await;

        assert_eq!(reason, StopReason::EndOfInput);
        assert!(ctx.registry.is_empty());
        assert_eq!(read_to_end(&mut remote).await, b"bye");
    }

    #[tokio::test]
    async fn test_interrupt_closes_all() {
        let (ctx, _events) = PeerContext::new();
        let mut remote = connect_peer(&ctx).await;

        let (tx, mut interrupt) = Interrupt::new();
        tx.send(true).unwrap();

        let mut lines = BufReader::new(tokio_test::io::Builder::new().build()).lines();
        let reason = Broadcaster::new(&ctx).run(&mut lines, &mut interrupt).await;

        assert_eq!(reason, StopReason::Interrupted);
        assert!(ctx.registry.is_empty());
        assert!(read_to_end(&mut remote).await.is_empty());
    }

    #[tokio::test]
    async fn test_interrupt_during_stalled_write() {
        let (ctx, _events) = PeerContext::new();
        // Never read from: the socket buffers fill and the write blocks
        let _remote = connect_peer(&ctx).await;

        let mut input = vec![b'x'; 32 * 1024 * 1024];
        input.push(b'\n');
        let mut lines = std::io::Cursor::new(input).lines();

        let (tx, mut interrupt) = Interrupt::new();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = tx.send(true);
        });

        let reason = tokio::time::timeout(
            Duration::from_secs(5),
            Broadcaster::new(&ctx).run(&mut lines, &mut interrupt),
        )
        .await
        .expect("broadcast blocked shutdown");

        assert_eq!(reason, StopReason::Interrupted);
        assert!(ctx.registry.is_empty());
    }
}
