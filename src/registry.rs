//! Subscription Registry
//!
//! Tracks which connection is selected onto which key and fans change
//! events out to the other subscribers of a key.
//!
//! ## Responsibilities
//! - key → ordered, duplicate-free set of connections
//! - connection → its single selected key
//! - Drop a key's entry as soon as its set becomes empty
//! - Deliver events through an [`EventSink`] (the transport)

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;

use crate::key::DocumentKey;

/// Stable identifier for one client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Out-of-band events pushed to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The selected document has a new version; fetch it with `get`
    Changed,
}

impl Event {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Event::Changed => "changed",
        }
    }
}

/// Delivers events to connections. Implemented by the transport.
pub trait EventSink: Send + Sync {
    fn send(&self, connection: ConnectionId, event: &Event);
}

#[derive(Default)]
struct Subscriptions {
    by_key: HashMap<DocumentKey, IndexSet<ConnectionId>>,
    by_connection: HashMap<ConnectionId, DocumentKey>,
}

impl Subscriptions {
    fn remove(&mut self, connection: ConnectionId) -> Option<DocumentKey> {
        let key = self.by_connection.remove(&connection)?;
        if let Some(set) = self.by_key.get_mut(&key) {
            set.shift_remove(&connection);
            if set.is_empty() {
                self.by_key.remove(&key);
            }
        }
        Some(key)
    }
}

/// Key → subscribers map with event fan-out
pub struct SubscriptionRegistry {
    subscriptions: RwLock<Subscriptions>,
    sink: Arc<dyn EventSink>,
}

impl SubscriptionRegistry {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            subscriptions: RwLock::new(Subscriptions::default()),
            sink,
        }
    }

    /// Move `connection` onto `key`, leaving its previous key.
    /// `None` leaves the connection unselected.
    pub fn select(&self, connection: ConnectionId, key: Option<DocumentKey>) {
        let mut subs = self.subscriptions.write();
        let previous = subs.remove(connection);

        if let Some(key) = key {
            tracing::debug!(conn = %connection, %key, previous = ?previous.map(|k| k.to_string()), "Key selected");
            subs.by_key.entry(key.clone()).or_default().insert(connection);
            subs.by_connection.insert(connection, key);
        } else {
            tracing::debug!(conn = %connection, "Key deselected");
        }
    }

    /// Remove `connection` from whatever key it had selected
    pub fn deselect(&self, connection: ConnectionId) -> Option<DocumentKey> {
        self.subscriptions.write().remove(connection)
    }

    /// Send `event` to every subscriber of `key` except `excluding`
    ///
    /// Subscribers are snapshotted first; the sink is called without the
    /// registry lock held. Returns the number of connections notified.
    pub fn notify(&self, key: &DocumentKey, event: &Event, excluding: Option<ConnectionId>) -> usize {
        let targets: Vec<ConnectionId> = {
            let subs = self.subscriptions.read();
            match subs.by_key.get(key) {
                Some(set) => set
                    .iter()
                    .copied()
                    .filter(|conn| Some(*conn) != excluding)
                    .collect(),
                None => Vec::new(),
            }
        };

        for connection in &targets {
            self.sink.send(*connection, event);
        }

        tracing::debug!(%key, event = event.name(), recipients = targets.len(), "Event broadcast");
        targets.len()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Key currently selected by `connection`
    pub fn selected_key(&self, connection: ConnectionId) -> Option<DocumentKey> {
        self.subscriptions.read().by_connection.get(&connection).cloned()
    }

    /// Subscribers of `key` in selection order
    pub fn subscribers(&self, key: &DocumentKey) -> Vec<ConnectionId> {
        self.subscriptions
            .read()
            .by_key
            .get(key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of keys with at least one subscriber
    pub fn key_count(&self) -> usize {
        self.subscriptions.read().by_key.len()
    }
}
