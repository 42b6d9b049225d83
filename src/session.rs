//! Session Handler
//!
//! Per-connection state machine and command dispatch.
//!
//! ```text
//!              selectKey(ref)            selectKey(ref')
//! Unselected ─────────────────▶ Selected(key) ──────────▶ Selected(key')
//!     ▲                              │
//!     └──────── selectKey(null) ─────┘
//! ```
//!
//! `get` and `set` need a selected key. Every request runs inside a drain
//! permit and produces exactly one [`Response`].

use crate::error::{Result, SyncError};
use crate::key::DocumentKey;
use crate::protocol::{Command, Request, Response};
use crate::registry::{ConnectionId, Event};
use crate::service::SyncService;
use crate::store::{now_millis, WriterInfo};

/// Selection state of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unselected,
    Selected(DocumentKey),
}

/// One connection's protocol state
pub struct Session {
    id: ConnectionId,

    /// Peer IP, recorded on every document this session writes
    peer_ip: Option<String>,

    state: SessionState,
}

impl Session {
    pub fn new(id: ConnectionId, peer_ip: Option<String>) -> Self {
        Self {
            id,
            peer_ip,
            state: SessionState::Unselected,
        }
    }

    /// Answer one request
    pub fn handle(&mut self, service: &SyncService, request: &Request) -> Response {
        let _permit = service.drain().enter();

        tracing::trace!(conn = %self.id, ack = request.ack, command = %request.command, "Request");

        match self.dispatch(service, request) {
            Ok(response) => response,
            Err(e) => {
                if e.is_validation() {
                    tracing::debug!(conn = %self.id, ack = request.ack, error = %e, "Request rejected");
                } else {
                    tracing::warn!(conn = %self.id, ack = request.ack, error = %e, "Request failed");
                }
                Response::from(e)
            }
        }
    }

    fn dispatch(&mut self, service: &SyncService, request: &Request) -> Result<Response> {
        match request.command()? {
            Command::Now => Ok(Response::Timestamp(now_millis())),

            Command::SelectKey { reference } => {
                let key = reference.map(|r| DocumentKey::new(service.bucket().cloned(), r));
                service.registry().select(self.id, key.clone());
                self.state = match key {
                    Some(key) => SessionState::Selected(key),
                    None => SessionState::Unselected,
                };
                Ok(Response::Selected)
            }

            Command::Get { known } => {
                let key = self.selected_key()?;
                Ok(Response::Document(service.engine().get(key, known)?))
            }

            Command::Set { data, version } => {
                let key = self.selected_key()?;
                if data.len() > service.max_data_size() {
                    return Err(SyncError::PayloadTooLarge {
                        size: data.len(),
                        max: service.max_data_size(),
                    });
                }

                let writer_info = self.peer_ip.clone().map(|ip| WriterInfo { ip });
                let outcome = service.engine().set(key, data, version, writer_info)?;

                if outcome.is_committed() {
                    service.registry().notify(key, &Event::Changed, Some(self.id));
                }

                Ok(Response::Set(outcome))
            }
        }
    }

    /// Release the subscription. Ends the session.
    pub fn close(self, service: &SyncService) {
        service.registry().deselect(self.id);
        tracing::debug!(conn = %self.id, "Session closed");
    }

    fn selected_key(&self) -> Result<&DocumentKey> {
        match &self.state {
            SessionState::Selected(key) => Ok(key),
            SessionState::Unselected => Err(SyncError::ReferenceNotProvided),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }
}
