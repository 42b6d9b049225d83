//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! One JSON object per line, in both directions.
//!
//! ### Request
//! ```text
//! {"ack": 7, "command": "set", "args": {"data": "…", "version": 3}}
//! ```
//!
//! ### Reply (exactly one per request)
//! ```text
//! {"ack": 7, "response": {"success": true, "version": 4}}
//! {"ack": 7, "response": {"error": "reference is not provided"}}
//! ```
//!
//! ### Event
//! ```text
//! {"event": "changed"}
//! ```

use std::io::{BufRead, Read, Write};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, SyncError};
use crate::registry::Event;

use super::{Command, Response};

/// Maximum frame size (8 MB). Leaves room for a 1 MiB `data` string after
/// JSON escaping.
pub const MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// A request as read off the wire, before command validation
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Acknowledgement id; the reply echoes it
    pub ack: u64,
    pub command: String,
    pub args: Value,
}

impl Request {
    /// Validate the command name and arguments
    pub fn command(&self) -> Result<Command> {
        Command::parse(&self.command, &self.args)
    }
}

/// A frame sent by the server, as seen by a client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Reply { ack: u64, response: Value },
    Event { name: String },
}

#[derive(Deserialize)]
struct RawRequest {
    #[serde(default)]
    ack: Option<Value>,
    #[serde(default)]
    command: Option<Value>,
    #[serde(default)]
    args: Value,
}

#[derive(Deserialize)]
struct RawServerFrame {
    #[serde(default)]
    ack: Option<u64>,
    #[serde(default)]
    response: Option<Value>,
    #[serde(default)]
    event: Option<String>,
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request line (without the trailing newline)
pub fn encode_request(ack: u64, command: &Command) -> String {
    serde_json::json!({
        "ack": ack,
        "command": command.command_type().as_str(),
        "args": command.args(),
    })
    .to_string()
}

/// Decode a request line
///
/// Fails with `ProtocolAbuse` when the frame has no usable `ack`, since
/// there is then no way to answer it. A missing or non-string `command`
/// decodes to an empty name, which is answered as an unknown command.
pub fn decode_request(line: &str) -> Result<Request> {
    let raw: RawRequest = serde_json::from_str(line)
        .map_err(|e| SyncError::ProtocolAbuse(format!("unreadable frame: {}", e)))?;

    let ack = match raw.ack {
        Some(value) => value.as_u64().ok_or_else(|| {
            SyncError::ProtocolAbuse(format!("ack must be a non-negative integer, got {}", value))
        })?,
        None => {
            return Err(SyncError::ProtocolAbuse(
                "request without acknowledgement id".to_string(),
            ))
        }
    };

    let command = match raw.command {
        Some(Value::String(name)) => name,
        _ => String::new(),
    };

    Ok(Request {
        ack,
        command,
        args: raw.args,
    })
}

// =============================================================================
// Server Frame Encoding/Decoding
// =============================================================================

/// Encode a reply line
pub fn encode_reply(ack: u64, response: &Response) -> String {
    serde_json::json!({ "ack": ack, "response": response.to_value() }).to_string()
}

/// Encode an event line
pub fn encode_event(event: &Event) -> String {
    serde_json::json!({ "event": event.name() }).to_string()
}

/// Decode a line sent by the server
pub fn decode_server_frame(line: &str) -> Result<ServerFrame> {
    let raw: RawServerFrame = serde_json::from_str(line)?;

    match (raw.ack, raw.event) {
        (Some(ack), None) => Ok(ServerFrame::Reply {
            ack,
            response: raw.response.unwrap_or(Value::Null),
        }),
        (None, Some(name)) => Ok(ServerFrame::Event { name }),
        _ => Err(SyncError::Protocol(format!(
            "frame is neither a reply nor an event: {}",
            line
        ))),
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one line from a stream
///
/// Returns `Ok(None)` at end of stream. Lines longer than `MAX_FRAME_SIZE`
/// are protocol abuse.
pub fn read_frame<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let limit = MAX_FRAME_SIZE as u64 + 1;
    let read = reader.by_ref().take(limit).read_until(b'\n', &mut buf)?;

    if read == 0 {
        return Ok(None);
    }

    if buf.last() != Some(&b'\n') {
        if buf.len() > MAX_FRAME_SIZE {
            return Err(SyncError::ProtocolAbuse(format!(
                "frame too large (max {} bytes)",
                MAX_FRAME_SIZE
            )));
        }
    } else {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }

    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| SyncError::ProtocolAbuse("frame is not valid UTF-8".to_string()))
}

/// Write one line to a stream and flush it
pub fn write_frame<W: Write>(writer: &mut W, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
