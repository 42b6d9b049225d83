//! Blocking client
//!
//! Speaks the line protocol to a keysync server. Events that arrive while
//! waiting for a reply are queued and handed out by [`Client::next_event`].

use std::collections::VecDeque;
use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde_json::Value;

use crate::engine::{SetOutcome, Snapshot};
use crate::error::{Result, SyncError};
use crate::key::Reference;
use crate::protocol::{decode_server_frame, encode_request, read_frame, write_frame, Command, ServerFrame};

pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    next_ack: u64,

    /// Event names received but not yet consumed
    events: VecDeque<String>,
}

impl Client {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let write_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(stream),
            writer: BufWriter::new(write_stream),
            next_ack: 1,
            events: VecDeque::new(),
        })
    }

    /// Server time in Unix milliseconds
    pub fn now(&mut self) -> Result<i64> {
        let response = self.call(&Command::Now)?;
        response
            .get("timestamp")
            .and_then(Value::as_i64)
            .ok_or_else(|| unexpected("now", &response))
    }

    /// Select a document, or deselect with `None`
    pub fn select_key(&mut self, reference: Option<&str>) -> Result<()> {
        let reference = reference.map(Reference::parse).transpose()?;
        self.call(&Command::SelectKey { reference })?;
        Ok(())
    }

    /// Fetch the selected document
    pub fn get(&mut self, known: Option<u64>) -> Result<Option<Snapshot>> {
        let response = self.call(&Command::Get { known })?;
        if response.is_null() {
            return Ok(None);
        }

        let version = response
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| unexpected("get", &response))?;
        let data = response.get("data").and_then(Value::as_str).map(str::to_string);

        Ok(Some(Snapshot { version, data }))
    }

    /// Write the selected document
    pub fn set(&mut self, data: &str, version: Option<u64>) -> Result<SetOutcome> {
        let response = self.call(&Command::Set {
            data: data.to_string(),
            version,
        })?;

        let success = response
            .get("success")
            .and_then(Value::as_bool)
            .ok_or_else(|| unexpected("set", &response))?;
        let new_version = response.get("version").and_then(Value::as_u64);

        if success {
            let version = new_version.ok_or_else(|| unexpected("set", &response))?;
            return Ok(SetOutcome::Committed { version });
        }

        Ok(SetOutcome::Conflict {
            data: response.get("data").and_then(Value::as_str).map(str::to_string),
            version: new_version,
        })
    }

    /// Send a command and wait for its reply
    ///
    /// An `{error}` reply becomes `SyncError::Remote`.
    pub fn call(&mut self, command: &Command) -> Result<Value> {
        let ack = self.next_ack;
        self.next_ack += 1;
        self.send_raw(&encode_request(ack, command))?;
        self.wait_for_reply(ack)
    }

    /// Write a raw line, bypassing request encoding
    pub fn send_raw(&mut self, line: &str) -> Result<()> {
        write_frame(&mut self.writer, line)
    }

    /// Wait for the reply carrying `ack`, queueing events seen meanwhile
    pub fn wait_for_reply(&mut self, ack: u64) -> Result<Value> {
        loop {
            match self.read_server_frame()? {
                ServerFrame::Event { name } => self.events.push_back(name),
                ServerFrame::Reply { ack: got, response } if got == ack => {
                    if let Some(message) = response.get("error").and_then(Value::as_str) {
                        return Err(SyncError::Remote(message.to_string()));
                    }
                    return Ok(response);
                }
                ServerFrame::Reply { ack: got, .. } => {
                    return Err(SyncError::Protocol(format!(
                        "reply for ack {} while waiting for {}",
                        got, ack
                    )))
                }
            }
        }
    }

    /// Next event name, waiting at most `timeout`
    pub fn next_event(&mut self, timeout: Duration) -> Result<Option<String>> {
        if let Some(name) = self.events.pop_front() {
            return Ok(Some(name));
        }

        self.reader.get_ref().set_read_timeout(Some(timeout))?;
        let frame = self.read_server_frame();
        self.reader.get_ref().set_read_timeout(None)?;

        match frame {
            Ok(ServerFrame::Event { name }) => Ok(Some(name)),
            Ok(ServerFrame::Reply { ack, .. }) => Err(SyncError::Protocol(format!(
                "unexpected reply for ack {}",
                ack
            ))),
            Err(SyncError::Io(ref e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// True once the server has closed the connection
    pub fn is_closed(&mut self, timeout: Duration) -> Result<bool> {
        self.reader.get_ref().set_read_timeout(Some(timeout))?;
        let frame = read_frame(&mut self.reader);
        self.reader.get_ref().set_read_timeout(None)?;

        match frame {
            Ok(None) => Ok(true),
            Ok(Some(_)) => Ok(false),
            Err(SyncError::Io(ref e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(false)
            }
            Err(SyncError::Io(ref e))
                if matches!(e.kind(), ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted) =>
            {
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    fn read_server_frame(&mut self) -> Result<ServerFrame> {
        match read_frame(&mut self.reader)? {
            Some(line) => decode_server_frame(&line),
            None => Err(SyncError::Network("connection closed by server".to_string())),
        }
    }
}

fn unexpected(command: &str, response: &Value) -> SyncError {
    SyncError::Protocol(format!("unexpected {} reply: {}", command, response))
}
