//! Connection Module
//!
//! This module manages the individual peer connections of a chat node.
//! Each connection, whether accepted by the listener or dialed by us, is
//! read by its own async task.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │  Listener (accept)   │      │   Dialer (connect)   │
//! └──────────┬───────────┘      └───────────┬──────────┘
//!            │                              │
//!            └──────────────┬───────────────┘
//!                           │ spawn_handler()
//!                           ▼
//!            ┌──────────────────────────────┐
//!            │ Registry::add + spawn task   │
//!            └──────────────┬───────────────┘
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Read chunk  │───>│ Decode text │───>│ Emit event  │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                                                             │
//! │  on EOF / error / close: Registry::remove + close           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use peerchat::connection::{spawn_handler, Direction, PeerContext};
//!
//! let (ctx, mut events) = PeerContext::new();
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! spawn_handler(stream, addr, Direction::Inbound, &ctx);
//! ```

pub mod handler;
pub mod peer;

// Re-export commonly used types
pub use handler::{spawn_handler, ConnectionError, ConnectionHandler, PeerContext, PeerEvent};
pub use peer::{Connection, Direction, PeerStats};
