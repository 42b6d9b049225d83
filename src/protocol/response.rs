//! Response definitions
//!
//! Represents responses to clients.

use serde_json::{json, Value};

use crate::engine::{SetOutcome, Snapshot};
use crate::error::SyncError;

/// A response to send to a client, answering exactly one request
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// `now` → `{"timestamp"}`
    Timestamp(i64),

    /// `selectKey` → `{}`
    Selected,

    /// `get` → `{"version"}`, `{"data","version"}` or `null`
    Document(Option<Snapshot>),

    /// `set` → `{"success","version"}` plus `data` on conflict
    Set(SetOutcome),

    /// Any failure → `{"error"}`
    Error(String),
}

impl Response {
    /// Create an ERROR response
    pub fn error(message: &str) -> Self {
        Response::Error(message.to_string())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    /// Wire representation of the response payload
    pub fn to_value(&self) -> Value {
        match self {
            Response::Timestamp(timestamp) => json!({ "timestamp": timestamp }),
            Response::Selected => json!({}),
            Response::Document(None) => Value::Null,
            Response::Document(Some(Snapshot { version, data: None })) => {
                json!({ "version": version })
            }
            Response::Document(Some(Snapshot {
                version,
                data: Some(data),
            })) => json!({ "data": data, "version": version }),
            Response::Set(SetOutcome::Committed { version }) => {
                json!({ "success": true, "version": version })
            }
            Response::Set(SetOutcome::Conflict { data, version }) => {
                let mut value = json!({ "success": false });
                if let Some(data) = data {
                    value["data"] = json!(data);
                }
                if let Some(version) = version {
                    value["version"] = json!(version);
                }
                value
            }
            Response::Error(message) => json!({ "error": message }),
        }
    }
}

impl From<SyncError> for Response {
    fn from(e: SyncError) -> Self {
        Response::Error(e.to_string())
    }
}
