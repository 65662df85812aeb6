//! Error types for the synchronization core
//!
//! Provides typed errors for session, store, and snapshot operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the synchronization core
#[derive(Error, Debug)]
pub enum SyncError {
    /// An operation required an active transport and none exists.
    ///
    /// Recoverable: retry after the session reconnects.
    #[error("not connected: the session has no active transport")]
    NotConnected,

    /// A store key was registered twice on the same session.
    ///
    /// Signals a configuration mistake, not a runtime condition.
    #[error("store key '{key}' is already registered on this session")]
    DuplicateKey { key: String },

    /// An inbound patch does not fit the store's declared shape.
    ///
    /// The patch is dropped and the store is left unchanged.
    #[error("patch does not fit the store shape: {details}")]
    MalformedPatch { details: String },

    /// Failed to encode an outbound message or state value
    #[error("encode error: {0}")]
    Encode(String),

    /// Failed to decode an inbound message
    #[error("decode error: {0}")]
    Decode(String),

    /// Failed to read a snapshot file
    #[error("failed to read snapshot '{path}': {source}")]
    SnapshotRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write a snapshot file
    #[error("failed to write snapshot '{path}': {source}")]
    SnapshotWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The session task has shut down and no longer accepts work
    #[error("session is shut down")]
    ChannelClosed,
}

impl SyncError {
    /// Wrap a serializer error
    pub fn encode(err: impl std::fmt::Display) -> Self {
        SyncError::Encode(err.to_string())
    }

    /// Wrap a deserializer error
    pub fn decode(err: impl std::fmt::Display) -> Self {
        SyncError::Decode(err.to_string())
    }

    /// Whether the caller can retry this operation after reconnecting
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SyncError::NotConnected)
    }
}

/// Result type for synchronization operations
pub type SyncResult<T> = Result<T, SyncError>;
