//! Document record
//!
//! The persisted unit: payload, version counter, timestamps and writer metadata.

use serde::{Deserialize, Serialize};

/// Origin metadata attached by the session layer on each write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterInfo {
    /// Peer address of the connection that wrote the document
    pub ip: String,
}

/// A stored document
///
/// Timestamps are Unix milliseconds. A version 1 document has `created`
/// and no `updated`; every later version carries both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub data: String,
    pub version: u64,
    pub created: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer_info: Option<WriterInfo>,
}

impl Document {
    /// First version of a document
    pub fn first(data: String, writer_info: Option<WriterInfo>) -> Self {
        Self {
            data,
            version: 1,
            created: now_millis(),
            updated: None,
            writer_info,
        }
    }

    /// The document that follows `self`, keeping `created`
    pub fn next(&self, data: String, writer_info: Option<WriterInfo>) -> Self {
        Self {
            data,
            version: self.version + 1,
            created: self.created,
            updated: Some(now_millis()),
            writer_info,
        }
    }
}

/// Current wall-clock time in Unix milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
