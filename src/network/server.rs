//! TCP Server
//!
//! Accepts connections and runs each one on its own thread.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::drain::DrainOutcome;
use crate::error::{Result, SyncError};
use crate::service::SyncService;

use super::{Connection, ConnectionHub};

/// How often the accept loop checks the shutdown flag
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// TCP server for keysync
pub struct Server {
    config: Config,
    listener: TcpListener,
    service: Arc<SyncService>,
    hub: Arc<ConnectionHub>,
    shutdown: Arc<AtomicBool>,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    /// Open the storage and bind the listen address
    pub fn bind(config: Config) -> Result<Self> {
        let hub = Arc::new(ConnectionHub::new());
        let service = Arc::new(SyncService::open(&config, hub.clone())?);

        let listener = TcpListener::bind(&config.listen_addr).map_err(|e| {
            SyncError::Network(format!("failed to bind {}: {}", config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;

        tracing::info!(addr = %listener.local_addr()?, "Listening");

        Ok(Self {
            config,
            listener,
            service,
            hub,
            shutdown: Arc::new(AtomicBool::new(false)),
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Start the server (blocking)
    ///
    /// Accepts until shutdown is signalled, then drains in-flight requests
    /// for at most `drain_timeout_ms` and returns.
    pub fn run(&self) -> Result<DrainOutcome> {
        while !self.shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    stream.set_nonblocking(false)?;

                    if self.active_connections.load(Ordering::Relaxed) >= self.config.max_connections {
                        tracing::warn!(peer = %addr, max = self.config.max_connections, "Connection limit reached, rejecting");
                        continue;
                    }

                    self.spawn_connection(stream, addr);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!(
            in_flight = self.service.drain().in_flight(),
            connections = self.hub.connection_count(),
            "Shutting down, draining in-flight requests"
        );

        let outcome = self.service.drain().drain(self.config.drain_timeout());
        match outcome {
            DrainOutcome::Drained => tracing::info!("Drain complete"),
            DrainOutcome::TimedOut { in_flight } => {
                tracing::warn!(in_flight, "Drain deadline passed, shutting down anyway")
            }
        }

        Ok(outcome)
    }

    fn spawn_connection(&self, stream: std::net::TcpStream, addr: SocketAddr) {
        let service = Arc::clone(&self.service);
        let hub = Arc::clone(&self.hub);
        let active = Arc::clone(&self.active_connections);
        active.fetch_add(1, Ordering::Relaxed);

        let spawned = thread::Builder::new()
            .name(format!("keysync-conn-{}", addr))
            .spawn(move || {
                match Connection::new(stream, service, hub) {
                    Ok(mut connection) => {
                        // Errors are logged by the connection itself
                        let _ = connection.handle();
                    }
                    Err(e) => tracing::warn!(peer = %addr, error = %e, "Connection setup failed"),
                }
                active.fetch_sub(1, Ordering::Relaxed);
            });

        if let Err(e) = spawned {
            self.active_connections.fetch_sub(1, Ordering::Relaxed);
            tracing::warn!(peer = %addr, error = %e, "Failed to spawn connection thread");
        }
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Flag that stops the accept loop when set (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn service(&self) -> &Arc<SyncService> {
        &self.service
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }
}
