//! # keysync
//!
//! A small real-time document-sync server:
//! - One JSON document per key, crash-safe via a two-phase backup rename
//! - Optimistic concurrency: writes carry the version they were based on
//! - Per-key FIFO locking, full parallelism across keys
//! - `changed` notifications to every other connection on the same key
//! - Graceful shutdown that drains in-flight requests
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │           (thread per connection + writer thread)            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Session (per connection)                     │
//! │        now / selectKey / get / set  inside DrainBarrier      │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │     Engine      │   committed    │  Subscription   │
//!   │ (version check) │ ─────────────▶ │    Registry     │──▶ EventSink
//!   └────────┬────────┘                └─────────────────┘
//!            │
//!   ┌────────▼────────┐
//!   │ KeyLockManager  │
//!   └────────┬────────┘
//!            │
//!   ┌────────▼────────┐
//!   │  DocumentStore  │
//!   │ (backup rename) │
//!   └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod key;

pub mod store;
pub mod lock;
pub mod engine;
pub mod registry;
pub mod drain;
pub mod protocol;
pub mod session;
pub mod service;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{SyncError, Result};
pub use config::Config;
pub use engine::{Engine, SetOutcome, Snapshot};
pub use key::{Bucket, DocumentKey, Reference};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of keysync
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
