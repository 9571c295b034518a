//! peerchat - A Minimal Peer-to-Peer Terminal Chat
//!
//! Every running instance is a full peer: it listens for inbound
//! connections, can dial other peers, and broadcasts each line typed by the
//! operator to every peer it is connected to.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              peerchat                                   │
//! │                                                                         │
//! │  ┌─────────────┐     ┌─────────────┐     ┌──────────────────────────┐   │
//! │  │  Listener   │     │   Dialer    │     │  Console (main task)     │   │
//! │  │ (accept)    │     │ (connect)   │     │  prompts + Broadcaster   │   │
//! │  └──────┬──────┘     └──────┬──────┘     └────────────┬─────────────┘   │
//! │         │ add               │ add           snapshot  │ clear_and_take  │
//! │         ▼                   ▼                         ▼                 │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │                 Registry (one Mutex, never held across I/O)      │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! │         ▲ remove                                                        │
//! │  ┌──────┴──────────────────────────────────┐                            │
//! │  │ ConnectionHandler (one task per peer)   │──── PeerEvent ──> printer  │
//! │  └─────────────────────────────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//!
//! There is none to speak of: operator lines are written to the socket as
//! raw UTF-8 bytes with no delimiter and no length prefix. The receiving
//! side displays whatever each read returns, so messages can be split or
//! merged by TCP. Changing that would change the wire format and break
//! interoperability with existing peers.
//!
//! ## Module Overview
//!
//! - [`registry`]: lock-guarded set of live connections
//! - [`connection`]: per-connection state and the read handler
//! - [`network`]: listener and dialer
//! - [`console`]: operator prompts, input parsing and the broadcaster
//! - [`config`]: command-line configuration
//! - [`matrix`]: random square matrix generator
//!
//! ## Quick Start
//!
//! ```ignore
//! use peerchat::connection::PeerContext;
//! use peerchat::network::{start_listener, Dialer};
//! use peerchat::console::Broadcaster;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (ctx, _events) = PeerContext::new();
//!
//!     let _listener = start_listener("127.0.0.1", 8888, ctx.clone()).await;
//!     Dialer::new(ctx.clone()).dial("127.0.0.1", 8889).await;
//!
//!     Broadcaster::new(&ctx).broadcast("hello").await;
//! }
//! ```

pub mod config;
pub mod connection;
pub mod console;
pub mod matrix;
pub mod network;
pub mod registry;

// Re-export commonly used types for convenience
pub use config::{CliAction, Config, ConfigError};
pub use connection::{spawn_handler, Connection, Direction, PeerContext, PeerEvent, PeerStats};
pub use console::{Broadcaster, Session};
pub use matrix::{generate, MatrixError};
pub use network::{start_listener, DialError, Dialer, Listener, ListenerError, ListenerHandle};
pub use registry::Registry;

/// The host peers bind to and dial by default
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Well-known ports selected by the instance prompt (`1` and `2`)
pub const INSTANCE_PORTS: [u16; 2] = [8888, 8889];

/// Lowest port accepted as a literal instance selector
pub const MIN_PORT: u16 = 1024;

/// Reserved operator input that closes every connection and exits
pub const EXIT_KEYWORD: &str = "exit";

/// Maximum bytes taken from a socket per read
pub const READ_CHUNK_SIZE: usize = 1024;

/// Pending-connection queue depth of the listening socket
pub const LISTEN_BACKLOG: u32 = 5;

/// Default bound on an outbound connect attempt
pub const DEFAULT_CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Version of peerchat
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
