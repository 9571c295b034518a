//! Connection Registry
//!
//! The registry is the one piece of state shared by every part of a peer:
//! the listener and dialer add connections to it, handlers remove
//! themselves when their stream ends, and the broadcaster snapshots it to
//! fan out operator lines.
//!
//! ## Locking
//!
//! ```text
//!   Listener ──add──┐
//!   Dialer ───add───┤      ┌──────────────────────────┐
//!   Handler ──remove┼─────>│ Mutex<HashMap<id, Arc>>  │
//!   Broadcaster ────┘      └──────────────────────────┘
//!        snapshot / clear_and_take
//! ```
//!
//! A single `std::sync::Mutex` guards the membership. It is only held while
//! the map is mutated or copied and never across an `.await`, so a slow
//! socket can never stall an unrelated task waiting on the registry.
//!
//! Membership means "currently believed open". A peer that vanished is only
//! noticed by the next failed read in its handler.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Anything that can live in a [`Registry`].
///
/// Entries are identified by a process-unique id, so two connections to the
/// same remote address are still distinct members.
pub trait RegistryEntry {
    fn entry_id(&self) -> u64;
}

/// A lock-guarded set of live entries (peer connections in practice).
///
/// Designed to be wrapped in an `Arc` and injected into every component
/// that needs it. All operations are idempotent and infallible.
pub struct Registry<T = crate::connection::Connection> {
    members: Mutex<HashMap<u64, Arc<T>>>,
}

impl<T> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("members", &self.lock().len())
            .finish()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            members: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> Registry<T> {
    /// Poisoning is ignored: no operation leaves the map half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Arc<T>>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: RegistryEntry> Registry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry.
    ///
    /// # Returns
    ///
    /// Returns `true` if the entry was newly added, `false` if it was
    /// already present (in which case nothing changes).
    pub fn add(&self, entry: Arc<T>) -> bool {
        let mut members = self.lock();
        let id = entry.entry_id();
        if members.contains_key(&id) {
            return false;
        }
        members.insert(id, entry);
        true
    }

    /// Removes an entry.
    ///
    /// Returns `true` if it was present. Removing an absent entry is a no-op.
    pub fn remove(&self, entry: &T) -> bool {
        self.lock().remove(&entry.entry_id()).is_some()
    }

    /// Returns true if the entry is currently registered.
    pub fn contains(&self, entry: &T) -> bool {
        self.lock().contains_key(&entry.entry_id())
    }

    /// Returns a point-in-time copy of the membership.
    ///
    /// The copy can be iterated (and awaited on) without holding the lock.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.lock().values().cloned().collect()
    }

    /// Atomically empties the registry and returns everything it held.
    ///
    /// Any `add` that completed before this call is in the returned set;
    /// any `add` that starts after it lands in the (now empty) registry.
    pub fn clear_and_take(&self) -> Vec<Arc<T>> {
        let mut members = self.lock();
        std::mem::take(&mut *members).into_values().collect()
    }

    /// Returns the number of registered entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
