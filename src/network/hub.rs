//! Connection Hub
//!
//! Routes outbound lines to connections by id. Each connection has one
//! unbounded channel drained by its writer thread, so replies and events
//! for a connection go out in the order they were queued and a slow client
//! never blocks the thread that broadcasts to it.

use std::collections::HashMap;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

use crate::protocol::encode_event;
use crate::registry::{ConnectionId, Event, EventSink};

#[derive(Default)]
pub struct ConnectionHub {
    outbound: Mutex<HashMap<ConnectionId, Sender<String>>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the outbound queue for a new connection
    pub fn register(&self, connection: ConnectionId) -> Receiver<String> {
        let (tx, rx) = channel::unbounded();
        self.outbound.lock().insert(connection, tx);
        rx
    }

    /// Close the outbound queue. The writer finishes what is queued, then exits.
    pub fn unregister(&self, connection: ConnectionId) {
        self.outbound.lock().remove(&connection);
    }

    /// Queue a line for `connection`
    ///
    /// Returns `false` if the connection is gone.
    pub fn send_line(&self, connection: ConnectionId, line: String) -> bool {
        let sender = self.outbound.lock().get(&connection).cloned();
        match sender {
            Some(tx) => tx.send(line).is_ok(),
            None => false,
        }
    }

    /// Number of registered connections
    pub fn connection_count(&self) -> usize {
        self.outbound.lock().len()
    }
}

impl EventSink for ConnectionHub {
    fn send(&self, connection: ConnectionId, event: &Event) {
        if !self.send_line(connection, encode_event(event)) {
            tracing::debug!(conn = %connection, event = event.name(), "Event dropped, connection closed");
        }
    }
}
