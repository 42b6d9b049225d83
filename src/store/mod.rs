//! Store Module
//!
//! Key-addressed document persistence, one JSON file per document.
//!
//! ## Responsibilities
//! - Derive a deterministic path for every key
//! - Serialize documents to disk and read them back
//! - Keep a reader from ever seeing a half-written file (backup protocol)
//!
//! ## Layout
//! ```text
//! {storage_root}/
//!   ├── 3f/
//!   │   └── 3f9a…c1.json          (no bucket)
//!   └── {bucket}/
//!       └── a0/
//!           ├── a04e…77.json
//!           └── a04e…77.json.backup   (only while a write is in progress)
//! ```
//!
//! ## Write / Read Protocol
//! ```text
//! write:  primary ──rename──▶ backup ; write primary ; remove backup
//! read:   backup? ──rename──▶ primary ; read primary
//! ```

pub mod backup;
mod document;
mod manager;

pub use document::{now_millis, Document, WriterInfo};
pub use manager::DocumentStore;
