//! Error types for blocksim
//!
//! Empty queues and cache misses are ordinary control flow and never appear
//! here. Everything below is surfaced to the caller of the dispatch loop.

use crate::types::{ProcessId, ProcessState};
use thiserror::Error;

/// Common result type for blocksim operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for blocksim
#[derive(Debug, Error)]
pub enum Error {
    // Storage errors
    #[error("allocation failed for '{file}': requested {requested} blocks, {free} free")]
    AllocationFailed {
        file: String,
        requested: u64,
        free: u64,
    },

    // Namespace errors
    #[error("target not found: {path}/{file}")]
    TargetNotFound { path: String, file: String },

    #[error("target already exists: {path}/{file}")]
    DuplicateTarget { path: String, file: String },

    // Process lifecycle errors
    #[error("process {pid}: invalid transition {from} -> {to}")]
    InvalidTransition {
        pid: ProcessId,
        from: ProcessState,
        to: ProcessState,
    },

    #[error("a dispatch cycle is in progress")]
    Busy,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // Persistence errors
    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a snapshot error
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::TargetNotFound { .. })
    }

    /// Check if this error leaves the failing process BLOCKED
    #[must_use]
    pub const fn blocks_process(&self) -> bool {
        matches!(
            self,
            Self::AllocationFailed { .. } | Self::DuplicateTarget { .. }
        )
    }
}
