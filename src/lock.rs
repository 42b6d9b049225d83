//! Per-key Lock Manager
//!
//! Serializes read-modify-write sequences on the same document key.
//!
//! ## Concurrency Model
//! - One FIFO ticket queue per key, created on first use
//! - Callers on the same key are admitted strictly in arrival order
//! - Callers on different keys never wait on each other
//!   (the table mutex is only held to take a ticket or drop an entry)
//! - Entries are removed once the last holder/waiter leaves

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::key::DocumentKey;

/// Ticket queue for a single key
#[derive(Default)]
struct KeyQueue {
    /// Ticket currently allowed to run
    serving: Mutex<u64>,
    turn: Condvar,
}

/// Lock table slot: the queue plus bookkeeping protected by the table mutex
struct Slot {
    queue: Arc<KeyQueue>,

    /// Next ticket to hand out
    next_ticket: u64,

    /// Holders + waiters; the slot is removed when this reaches zero
    users: usize,
}

/// Hands out exclusive per-key critical sections
#[derive(Default)]
pub struct KeyLockManager {
    table: Mutex<HashMap<DocumentKey, Slot>>,
}

impl KeyLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` while holding the lock for `key`
    ///
    /// The lock is released when `operation` returns, fails, or panics.
    pub fn with_key_lock<T, E, F>(&self, key: &DocumentKey, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let _guard = self.lock(key);
        operation()
    }

    /// Block until the lock for `key` is ours
    pub fn lock(&self, key: &DocumentKey) -> KeyLockGuard<'_> {
        // Step 1: Take a ticket (arrival order is decided here)
        let (queue, ticket) = {
            let mut table = self.table.lock();
            let slot = table.entry(key.clone()).or_insert_with(|| Slot {
                queue: Arc::new(KeyQueue::default()),
                next_ticket: 0,
                users: 0,
            });
            let ticket = slot.next_ticket;
            slot.next_ticket += 1;
            slot.users += 1;
            (Arc::clone(&slot.queue), ticket)
        };

        // Step 2: Wait for our turn
        {
            let mut serving = queue.serving.lock();
            while *serving != ticket {
                queue.turn.wait(&mut serving);
            }
        }

        KeyLockGuard {
            manager: self,
            key: key.clone(),
            queue,
        }
    }

    /// Number of keys with a holder or waiter
    pub fn active_keys(&self) -> usize {
        self.table.lock().len()
    }

    /// Holder plus waiters currently queued on `key`
    pub fn queued(&self, key: &DocumentKey) -> usize {
        self.table.lock().get(key).map_or(0, |slot| slot.users)
    }

    fn release(&self, key: &DocumentKey, queue: &KeyQueue) {
        // Admit the next ticket
        {
            let mut serving = queue.serving.lock();
            *serving += 1;
        }
        queue.turn.notify_all();

        // Drop the slot if nobody else is queued on it
        let mut table = self.table.lock();
        if let Some(slot) = table.get_mut(key) {
            slot.users -= 1;
            if slot.users == 0 {
                table.remove(key);
            }
        }
    }
}

/// Exclusive access to one key; released on drop
pub struct KeyLockGuard<'a> {
    manager: &'a KeyLockManager,
    key: DocumentKey,
    queue: Arc<KeyQueue>,
}

impl KeyLockGuard<'_> {
    pub fn key(&self) -> &DocumentKey {
        &self.key
    }
}

impl Drop for KeyLockGuard<'_> {
    fn drop(&mut self) {
        self.manager.release(&self.key, &self.queue);
    }
}
