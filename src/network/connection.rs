//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::Receiver;

use crate::error::{Result, SyncError};
use crate::protocol::{decode_request, encode_reply, read_frame, write_frame};
use crate::registry::ConnectionId;
use crate::service::SyncService;
use crate::session::Session;

use super::ConnectionHub;

/// Handles a single client connection
pub struct Connection {
    id: ConnectionId,

    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// Drains the hub queue onto the socket
    writer: Option<JoinHandle<()>>,

    service: Arc<SyncService>,
    hub: Arc<ConnectionHub>,

    /// Peer address for logging
    peer_addr: String,

    /// Peer IP recorded as writer metadata
    peer_ip: Option<String>,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Registers with the hub and starts the writer thread.
    pub fn new(stream: TcpStream, service: Arc<SyncService>, hub: Arc<ConnectionHub>) -> Result<Self> {
        let peer = stream.peer_addr().ok();
        let peer_addr = peer
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let peer_ip = peer.map(|a| a.ip().to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        // Clone stream for separate read/write handles
        let write_stream = stream.try_clone()?;

        let id = service.next_connection_id();
        let outbound = hub.register(id);
        let writer = thread::Builder::new()
            .name(format!("keysync-writer-{}", id.0))
            .spawn(move || write_loop(id, write_stream, outbound))?;

        Ok(Self {
            id,
            reader: BufReader::new(stream),
            writer: Some(writer),
            service,
            hub,
            peer_addr,
            peer_ip,
        })
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads requests in a loop and queues one reply per request.
    /// Returns `Err` only for protocol abuse, which closes the connection.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!(conn = %self.id, peer = %self.peer_addr, "Connection established");

        let mut session = Session::new(self.id, self.peer_ip.clone());
        let result = self.serve(&mut session);

        session.close(&self.service);
        self.hub.unregister(self.id);
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }

        match &result {
            Ok(()) => tracing::debug!(conn = %self.id, peer = %self.peer_addr, "Client disconnected"),
            Err(e) => tracing::warn!(conn = %self.id, peer = %self.peer_addr, error = %e, "Closing connection"),
        }
        result
    }

    fn serve(&mut self, session: &mut Session) -> Result<()> {
        loop {
            // Read next frame
            let line = match read_frame(&mut self.reader) {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(()),
                Err(SyncError::Io(ref e)) if is_disconnect(e.kind()) => return Ok(()),
                Err(e) => return Err(e),
            };

            if line.trim().is_empty() {
                continue;
            }

            // A frame we cannot acknowledge ends the connection
            let request = decode_request(&line)?;

            let response = session.handle(&self.service, &request);

            if !self.hub.send_line(self.id, encode_reply(request.ack, &response)) {
                return Ok(());
            }
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

fn write_loop(id: ConnectionId, stream: TcpStream, outbound: Receiver<String>) {
    let mut writer = BufWriter::new(stream);

    for line in outbound {
        if let Err(e) = write_frame(&mut writer, &line) {
            // If the client disconnected before we could send, there is
            // nobody left to report to.
            tracing::debug!(conn = %id, error = %e, "Write failed, dropping outbound queue");
            break;
        }
    }

    let _ = writer.get_ref().shutdown(Shutdown::Both);
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
    )
}
