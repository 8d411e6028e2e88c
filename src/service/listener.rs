//! # Observer Capabilities
//!
//! The three listener surfaces an application can register on a client:
//! packet observers, connection-lifecycle observers, and data (world
//! state) observers.
//!
//! Listener sets are order-significant and snapshot-iterated: callbacks
//! may register or unregister listeners on the set currently being
//! notified without corrupting the round in progress. A panicking
//! callback is caught and logged; the remaining observers in the round
//! still run.

use crate::protocol::data::ObjectStatus;
use crate::protocol::message::Packet;
use crate::service::client::Client;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tracing::error;

/// Observer for every inbound packet.
pub trait PacketListener: Send + Sync {
    /// Filter called before [`PacketListener::packet_received`]; return
    /// false to skip this packet.
    fn accepts(&self, packet: &Packet) -> bool {
        let _ = packet;
        true
    }

    /// Called on the read loop for each accepted inbound packet, in wire
    /// arrival order.
    fn packet_received(&self, client: &Client, packet: &Packet);
}

/// Observer for connection lifecycle transitions.
pub trait ConnectionListener: Send + Sync {
    /// The session reached the connected phase.
    fn connected(&self, client: &Client) {
        let _ = client;
    }

    /// The session ended. Fires exactly once per session, for connect
    /// failures as well as mid-session disconnects.
    fn disconnected(&self, client: &Client) {
        let _ = client;
    }
}

/// Observer for world-state changes applied by automatic handling.
pub trait DataListener: Send + Sync {
    /// An entity entered the registry. Returning a listener registers it
    /// immediately, before the next observer runs.
    fn object_added(&self, client: &Client, object: &ObjectStatus) -> Option<Arc<dyn DataListener>> {
        let _ = (client, object);
        None
    }

    /// An entity was dropped. Return true to unregister this listener
    /// once the current notification round completes.
    fn object_removed(&self, client: &Client, object: &ObjectStatus) -> bool {
        let _ = (client, object);
        false
    }

    /// An entity's position changed.
    fn object_updated(&self, client: &Client, object: &ObjectStatus) {
        let _ = (client, object);
    }
}

/// One order-significant set of registered listeners.
///
/// Registration and removal may happen from any context, including from a
/// callback observing this very set; delivery works on a snapshot taken at
/// the start of the round.
pub(crate) struct ListenerSet<L: ?Sized> {
    entries: Mutex<Vec<Arc<L>>>,
}

impl<L: ?Sized> ListenerSet<L> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Append a listener. The same `Arc` may be registered once; repeats
    /// are ignored.
    pub fn add(&self, listener: Arc<L>) {
        if let Ok(mut entries) = self.entries.lock() {
            if !entries.iter().any(|e| Arc::ptr_eq(e, &listener)) {
                entries.push(listener);
            }
        }
    }

    /// Remove a listener by identity. Returns whether it was registered.
    pub fn remove(&self, listener: &Arc<L>) -> bool {
        if let Ok(mut entries) = self.entries.lock() {
            let before = entries.len();
            entries.retain(|e| !Arc::ptr_eq(e, listener));
            return entries.len() != before;
        }
        false
    }

    /// Whether the listener is currently registered.
    pub fn contains(&self, listener: &Arc<L>) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.iter().any(|e| Arc::ptr_eq(e, listener)))
            .unwrap_or(false)
    }

    /// Copy of the current registration order for one notification round.
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one observer callback, containing a panic to that callback.
/// Returns None when the callback panicked.
pub(crate) fn invoke<R>(callback: &'static str, f: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            error!(callback, "listener callback panicked");
            None
        }
    }
}
