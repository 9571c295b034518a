//! Network Module
//!
//! The two ways a connection comes into existence:
//!
//! - [`listener`]: accepts inbound connections on the configured port
//! - [`dialer`]: opens one outbound connection to `host:port`
//!
//! Both hand the new stream to
//! [`spawn_handler`](crate::connection::spawn_handler), which registers it
//! and starts its read task.
//!
//! ## Example
//!
//! ```ignore
//! use peerchat::connection::PeerContext;
//! use peerchat::network::{start_listener, Dialer};
//!
//! let (ctx, _events) = PeerContext::new();
//!
//! // Listener runs in the background until the handle is dropped
//! let listener = start_listener("127.0.0.1", 8888, ctx.clone()).await;
//!
//! // Dial another peer; failures are logged and yield None
//! let connection = Dialer::new(ctx).dial("127.0.0.1", 8889).await;
//! ```

pub mod dialer;
pub mod listener;

// Re-export commonly used types
pub use dialer::{DialError, Dialer};
pub use listener::{start_listener, Listener, ListenerError, ListenerHandle};
