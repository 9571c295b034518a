//! Console output for peer events.

use crate::connection::{Direction, PeerEvent};
use tokio::sync::mpsc;

/// Formats an event the way it is shown to the operator.
pub fn render(event: &PeerEvent) -> String {
    match event {
        PeerEvent::Connected {
            addr,
            direction: Direction::Inbound,
        } => format!("📥 Connection from {}", addr),
        PeerEvent::Connected {
            addr,
            direction: Direction::Outbound,
        } => format!("🔗 Connected to peer at {}", addr),
        PeerEvent::Message { from, text } => format!("\n📨 Received from {}: {}", from, text),
        PeerEvent::Disconnected { addr } => format!("Connection to {} closed", addr),
    }
}

/// Prints events until every sender is gone.
pub async fn print_events(mut events: mpsc::UnboundedReceiver<PeerEvent>) {
    while let Some(event) = events.recv().await {
        println!("{}", render(&event));
    }
}
