//! Operator Interrupts
//!
//! Ctrl+C must be able to cut through a blocked console read. Every prompt
//! races its `next_line()` against [`Interrupt::triggered`], so the main
//! task never stays parked on stdin once the operator asked to quit.

use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

/// A cloneable, level-triggered interrupt flag.
#[derive(Debug, Clone)]
pub struct Interrupt {
    rx: watch::Receiver<bool>,
}

impl Interrupt {
    /// Creates an interrupt fired through the returned sender.
    ///
    /// If the sender is dropped without firing, the interrupt never fires.
    pub fn new() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// Creates an interrupt fired by Ctrl+C.
    pub fn ctrl_c() -> Self {
        let (tx, interrupt) = Self::new();

        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl+C detected");
                    let _ = tx.send(true);
                }
                Err(e) => warn!(error = %e, "Failed to install Ctrl+C handler"),
            }
        });

        interrupt
    }

    /// Returns true once the interrupt has fired.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the interrupt has fired (immediately if it already has).
    pub async fn triggered(&mut self) {
        let sender_gone = self.rx.wait_for(|fired| *fired).await.is_err();
        if sender_gone {
            // Sender gone without firing: nothing can trigger us any more
            std::future::pending::<()>().await;
        }
    }
}
