//! Sync Service
//!
//! Everything a server instance shares across its connections: the engine,
//! the subscription registry and the drain barrier. Built once at startup
//! and handed to every session by reference.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::drain::DrainBarrier;
use crate::engine::Engine;
use crate::error::Result;
use crate::key::Bucket;
use crate::registry::{ConnectionId, EventSink, SubscriptionRegistry};

pub struct SyncService {
    engine: Engine,
    registry: SubscriptionRegistry,
    drain: DrainBarrier,

    /// Tenant label applied to every key selected on this instance
    bucket: Option<Bucket>,

    /// Max `data` size accepted by `set`
    max_data_size: usize,

    next_connection_id: AtomicU64,
}

impl SyncService {
    /// Open the engine and wire the registry to `sink`
    pub fn open(config: &Config, sink: Arc<dyn EventSink>) -> Result<Self> {
        let bucket = config.bucket()?;
        let engine = Engine::open(config)?;

        if let Some(bucket) = &bucket {
            tracing::info!(%bucket, "Serving bucket");
        }

        Ok(Self {
            engine,
            registry: SubscriptionRegistry::new(sink),
            drain: DrainBarrier::new(),
            bucket,
            max_data_size: config.max_data_size,
            next_connection_id: AtomicU64::new(1),
        })
    }

    /// Allocate an id for a new connection
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn drain(&self) -> &DrainBarrier {
        &self.drain
    }

    pub fn bucket(&self) -> Option<&Bucket> {
        self.bucket.as_ref()
    }

    pub fn max_data_size(&self) -> usize {
        self.max_data_size
    }
}
