//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (newline-delimited JSON)
//!
//! ### Commands
//! - `now`       - Args: none                → `{"timestamp"}`
//! - `selectKey` - Args: `{"ref"}`           → `{}`
//! - `get`       - Args: `{"known"}`         → `{"version"}` | `{"data","version"}` | `null`
//! - `set`       - Args: `{"data","version"}` → `{"success","version"[,"data"]}`
//!
//! ### Events
//! - `changed` - the selected document has a new version
//!
//! Every request carries an `ack` id and gets exactly one reply with the
//! same id. Requests without one close the connection.

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType};
pub use response::Response;
pub use codec::{
    decode_request, decode_server_frame, encode_event, encode_reply, encode_request, read_frame,
    write_frame, Request, ServerFrame, MAX_FRAME_SIZE,
};
