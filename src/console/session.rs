//! Interactive Session
//!
//! Drives the operator dialogue on the main task:
//!
//! ```text
//! 1. "Which peer instance is this?"  ──> listening port
//! 2. ┌─> "(c)onnect / (s)end / (e)xit"
//!    │        │
//!    │        ├── c ──> "host,port" ──> Dialer ──┐
//!    │        │                                  │
//!    └────────┼──────────────────────────────────┘
//!             ├── e ──> close all, done
//!             └── s / anything else ──> Broadcaster::run until exit
//! ```
//!
//! Every prompt is raced against the interrupt, and end of input at any
//! prompt ends the session as if the operator had chosen exit.

use super::broadcaster::{Broadcaster, StopReason};
use super::input::{parse_instance, InputError, MenuChoice, PeerAddress};
use super::interrupt::Interrupt;
use crate::connection::PeerContext;
use crate::network::Dialer;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{info, warn};

const INSTANCE_PROMPT: &str =
    "Which peer instance is this (1 or 2, or a port number 1024-65535)? ";
const MENU_PROMPT: &str = "Connect to another peer? (c)onnect / (s)end / (e)xit: ";
const ADDRESS_PROMPT: &str = "Enter peer address (IP,Port): ";
const MESSAGE_PROMPT: &str = "💬 You: ";

/// Result of a single prompt.
enum Prompted {
    Line(String),
    Closed(StopReason),
}

/// The operator-facing side of one peer.
pub struct Session<R> {
    lines: Lines<R>,
    ctx: PeerContext,
    dialer: Dialer,
    broadcaster: Broadcaster,
    interrupt: Interrupt,
}

impl<R: AsyncBufRead + Unpin> Session<R> {
    /// Creates a session reading operator input from `input`.
    pub fn new(
        input: R,
        ctx: PeerContext,
        connect_timeout: Duration,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            lines: input.lines(),
            dialer: Dialer::new(ctx.clone()).with_timeout(connect_timeout),
            broadcaster: Broadcaster::new(&ctx).with_prompt(MESSAGE_PROMPT),
            ctx,
            interrupt,
        }
    }

    /// Asks which instance this is and returns the port to listen on.
    pub async fn select_port(&mut self) -> Result<u16, InputError> {
        match self.prompt(INSTANCE_PROMPT).await {
            Prompted::Line(line) => parse_instance(&line),
            Prompted::Closed(StopReason::Interrupted) => Err(InputError::Interrupted),
            Prompted::Closed(_) => Err(InputError::Closed),
        }
    }

    /// Dials a peer given on the command line or at the menu.
    pub async fn connect(&self, peer: &PeerAddress) -> bool {
        self.dialer.dial(&peer.host, peer.port).await.is_some()
    }

    /// Runs the menu until the operator exits.
    ///
    /// All connections are closed by the time this returns.
    pub async fn run(&mut self) -> StopReason {
        loop {
            let choice = match self.prompt(MENU_PROMPT).await {
                Prompted::Line(line) => MenuChoice::parse(&line),
                Prompted::Closed(reason) => return self.shutdown(reason).await,
            };

            match choice {
                MenuChoice::Connect => {
                    let line = match self.prompt(ADDRESS_PROMPT).await {
                        Prompted::Line(line) => line,
                        Prompted::Closed(reason) => return self.shutdown(reason).await,
                    };

                    match line.parse::<PeerAddress>() {
                        Ok(peer) => {
                            self.connect(&peer).await;
                        }
                        Err(e) => warn!("{}", e),
                    }
                }
                MenuChoice::Exit => {
                    println!("👋 Exiting application...");
                    return self.shutdown(StopReason::ExitKeyword).await;
                }
                MenuChoice::Send => {
                    println!(
                        "Enter your message below. Type '{}' on a new line to close the application.",
                        crate::EXIT_KEYWORD
                    );
                    return self
                        .broadcaster
                        .run(&mut self.lines, &mut self.interrupt)
                        .await;
                }
            }
        }
    }

    async fn shutdown(&self, reason: StopReason) -> StopReason {
        info!(reason = ?reason, peers = self.ctx.registry.len(), "Ending session");
        self.broadcaster.close_all().await;
        reason
    }

    /// Prints `text` and waits for one line, end of input or the interrupt.
    async fn prompt(&mut self, text: &str) -> Prompted {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "{}", text);
        let _ = stdout.flush();

        let next = tokio::select! {
            biased;
            _ = self.interrupt.triggered() => return Prompted::Closed(StopReason::Interrupted),
            next = self.lines.next_line() => next,
        };

        match next {
            Ok(Some(line)) => Prompted::Line(line),
            Ok(None) => Prompted::Closed(StopReason::EndOfInput),
            Err(e) => {
                warn!(error = %e, "Failed to read console input");
                Prompted::Closed(StopReason::EndOfInput)
            }
        }
    }
}
