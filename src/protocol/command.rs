//! Command definitions
//!
//! Represents commands from clients.

use serde_json::{json, Map, Value};

use crate::error::{Result, SyncError};
use crate::key::Reference;

/// Command names as they appear on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Now,
    SelectKey,
    Get,
    Set,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Now => "now",
            CommandType::SelectKey => "selectKey",
            CommandType::Get => "get",
            CommandType::Set => "set",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "now" => Ok(CommandType::Now),
            "selectKey" => Ok(CommandType::SelectKey),
            "get" => Ok(CommandType::Get),
            "set" => Ok(CommandType::Set),
            other => Err(SyncError::UnknownCommand(other.to_string())),
        }
    }
}

/// A parsed and validated command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Server wall-clock time
    Now,

    /// Select a document (`None` deselects)
    SelectKey { reference: Option<Reference> },

    /// Fetch the selected document
    Get { known: Option<u64> },

    /// Write the selected document
    Set { data: String, version: Option<u64> },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Now => CommandType::Now,
            Command::SelectKey { .. } => CommandType::SelectKey,
            Command::Get { .. } => CommandType::Get,
            Command::Set { .. } => CommandType::Set,
        }
    }

    /// Build a command from its wire name and `args` object
    pub fn parse(name: &str, args: &Value) -> Result<Self> {
        let empty = Map::new();
        let args = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => {
                return Err(SyncError::Protocol(
                    "args must be an object".to_string(),
                ))
            }
        };

        match CommandType::parse(name)? {
            CommandType::Now => Ok(Command::Now),
            CommandType::SelectKey => parse_select_key(args),
            CommandType::Get => Ok(Command::Get {
                // Anything that isn't a version can't match one
                known: args.get("known").and_then(Value::as_u64),
            }),
            CommandType::Set => parse_set(args),
        }
    }

    /// The `args` object sent on the wire
    pub fn args(&self) -> Value {
        match self {
            Command::Now => json!({}),
            Command::SelectKey { reference } => {
                json!({ "ref": reference.as_ref().map(Reference::as_str) })
            }
            Command::Get { known } => json!({ "known": known }),
            Command::Set { data, version } => json!({ "data": data, "version": version }),
        }
    }
}

fn parse_select_key(args: &Map<String, Value>) -> Result<Command> {
    let reference = match args.get("ref") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(Reference::parse(s)?),
        Some(_) => {
            return Err(SyncError::InvalidReference(
                "expected a string or null".to_string(),
            ))
        }
    };
    Ok(Command::SelectKey { reference })
}

fn parse_set(args: &Map<String, Value>) -> Result<Command> {
    let data = match args.get("data") {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => {
            return Err(SyncError::InvalidPayload("data is required".to_string()))
        }
        Some(_) => {
            return Err(SyncError::InvalidPayload(
                "data must be an encoded string".to_string(),
            ))
        }
    };

    let version = match args.get("version") {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_u64() {
            Some(v) if v >= 1 => Some(v),
            _ => {
                return Err(SyncError::InvalidVersion(format!(
                    "expected a positive integer, got {}",
                    value
                )))
            }
        },
    };

    Ok(Command::Set { data, version })
}
