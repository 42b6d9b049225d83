//! Error types for keysync
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

/// Unified error type for keysync operations
#[derive(Debug, Error)]
pub enum SyncError {
    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Validation Errors (reported to the client, connection stays open)
    // -------------------------------------------------------------------------
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("invalid bucket: {0}")]
    InvalidBucket(String),

    #[error("reference is not provided")]
    ReferenceNotProvided,

    #[error("invalid data: {0}")]
    InvalidPayload(String),

    #[error("data is too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    // -------------------------------------------------------------------------
    // Network / Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A frame that cannot be acknowledged. Fatal to the connection.
    #[error("Protocol abuse: {0}")]
    ProtocolAbuse(String),

    #[error("Network error: {0}")]
    Network(String),

    /// An `{error}` reply, as seen by a client
    #[error("server error: {0}")]
    Remote(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// True for errors caused by bad client input
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidReference(_)
                | SyncError::InvalidBucket(_)
                | SyncError::ReferenceNotProvided
                | SyncError::InvalidPayload(_)
                | SyncError::PayloadTooLarge { .. }
                | SyncError::InvalidVersion(_)
                | SyncError::UnknownCommand(_)
        )
    }

    /// True for filesystem or encoding failures in the store
    pub fn is_storage(&self) -> bool {
        matches!(self, SyncError::Io(_) | SyncError::Serialization(_))
    }
}
