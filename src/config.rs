//! Configuration for keysync
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::key::Bucket;

/// Largest accepted `data` payload (1 MiB)
pub const DEFAULT_MAX_DATA_SIZE: usize = 1024 * 1024;

/// Main configuration for a keysync server instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all document files
    /// Internal structure:
    ///   {data_dir}/
    ///     └── [{bucket}/]{ref[0..2]}/{ref}.json
    pub data_dir: PathBuf,

    /// fsync each document file after writing it
    pub fsync_writes: bool,

    /// Tenant label every connection of this instance writes under
    pub bucket: Option<String>,

    /// Max size of a document's `data` field (in bytes)
    pub max_data_size: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    // -------------------------------------------------------------------------
    // Shutdown Configuration
    // -------------------------------------------------------------------------
    /// How long shutdown waits for in-flight requests (milliseconds)
    pub drain_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./keysync_data"),
            fsync_writes: true,
            bucket: None,
            max_data_size: DEFAULT_MAX_DATA_SIZE,
            listen_addr: "127.0.0.1:4700".to_string(),
            max_connections: 1024,
            drain_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parsed tenant label, if one is configured
    pub fn bucket(&self) -> Result<Option<Bucket>> {
        self.bucket.as_deref().map(Bucket::parse).transpose()
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (storage root for all documents)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Enable or disable fsync after each document write
    pub fn fsync_writes(mut self, enabled: bool) -> Self {
        self.config.fsync_writes = enabled;
        self
    }

    /// Set the tenant label
    pub fn bucket(mut self, bucket: Option<String>) -> Self {
        self.config.bucket = bucket;
        self
    }

    /// Set the maximum `data` size (in bytes)
    pub fn max_data_size(mut self, size: usize) -> Self {
        self.config.max_data_size = size;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the shutdown drain deadline (in milliseconds)
    pub fn drain_timeout_ms(mut self, ms: u64) -> Self {
        self.config.drain_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
