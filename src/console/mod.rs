//! Console Module
//!
//! Everything that talks to the operator:
//!
//! - [`session`]: the instance prompt and the (c)onnect / (s)end / (e)xit menu
//! - [`broadcaster`]: the send loop that fans lines out to every peer
//! - [`input`]: parsing of operator input
//! - [`interrupt`]: Ctrl+C as a flag every prompt can race against
//! - [`display`]: printing of incoming messages and connection events
//!
//! ## Example
//!
//! ```ignore
//! use peerchat::connection::PeerContext;
//! use peerchat::console::{Interrupt, Session};
//! use tokio::io::BufReader;
//!
//! let (ctx, events) = PeerContext::new();
//! tokio::spawn(peerchat::console::print_events(events));
//!
//! let stdin = BufReader::new(tokio::io::stdin());
//! let mut session = Session::new(stdin, ctx, timeout, Interrupt::ctrl_c());
//! let port = session.select_port().await?;
//! session.run().await;
//! ```

pub mod broadcaster;
pub mod display;
pub mod input;
pub mod interrupt;
pub mod session;

// Re-export commonly used types
pub use broadcaster::{BroadcastReport, Broadcaster, StopReason};
pub use display::{print_events, render};
pub use input::{InputError, MenuChoice, PeerAddress};
pub use interrupt::Interrupt;
pub use session::Session;
