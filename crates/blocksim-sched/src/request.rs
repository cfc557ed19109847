//! I/O requests and the processes that carry them through the scheduler

use blocksim_common::{BlockAddr, Error, Operation, ProcessId, ProcessState, Result};
use bytes::Bytes;
use serde::Serialize;

/// Operation-specific argument of a request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Payload {
    /// DELETE and READ carry nothing
    #[default]
    None,
    /// Number of blocks a CREATE reserves
    Size(u64),
    /// New contents written by an UPDATE
    Content(Bytes),
}

/// A positional I/O request; immutable once built
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IoRequest {
    operation: Operation,
    path: String,
    file_name: String,
    payload: Option<Bytes>,
    requested_size: Option<u64>,
    block_position: BlockAddr,
}

impl IoRequest {
    /// Build a request, checking that the payload matches the operation
    pub fn new(
        operation: Operation,
        path: impl Into<String>,
        file_name: impl Into<String>,
        payload: Payload,
        block_position: BlockAddr,
    ) -> Result<Self> {
        let file_name = file_name.into();
        if file_name.is_empty() {
            return Err(Error::invalid_request("file name must not be empty"));
        }

        let (payload, requested_size) = match (operation, payload) {
            (Operation::Create, Payload::Size(size)) => (None, Some(size)),
            (Operation::Update, Payload::Content(data)) => (Some(data), None),
            (Operation::Delete | Operation::Read, Payload::None) => (None, None),
            (op, payload) => {
                return Err(Error::invalid_request(format!(
                    "{op} does not accept payload {payload:?}"
                )));
            }
        };

        Ok(Self {
            operation,
            path: path.into(),
            file_name,
            payload,
            requested_size,
            block_position,
        })
    }

    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Contents written by an UPDATE
    #[must_use]
    pub const fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// Block count reserved by a CREATE
    #[must_use]
    pub const fn requested_size(&self) -> Option<u64> {
        self.requested_size
    }

    /// Address the disk head must visit to serve this request
    #[must_use]
    pub const fn block_position(&self) -> BlockAddr {
        self.block_position
    }
}

/// Scheduling unit wrapping one request
#[derive(Clone, Debug)]
pub struct IoProcess {
    id: ProcessId,
    name: String,
    request: IoRequest,
    user: String,
    state: ProcessState,
}

impl IoProcess {
    /// Create a NEW process named `<OPERATION>_<file>`
    pub fn new(id: ProcessId, request: IoRequest, user: impl Into<String>) -> Self {
        let name = format!("{}_{}", request.operation(), request.file_name());
        Self {
            id,
            name,
            request,
            user: user.into(),
            state: ProcessState::New,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ProcessId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn request(&self) -> &IoRequest {
        &self.request
    }

    /// Submitting user
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub const fn state(&self) -> ProcessState {
        self.state
    }

    /// Shorthand for the request's block position
    #[must_use]
    pub const fn block_position(&self) -> BlockAddr {
        self.request.block_position
    }

    /// Move to `next`, rejecting steps outside the lifecycle
    pub fn transition(&mut self, next: ProcessState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                pid: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Lightweight view for listings
    #[must_use]
    pub fn summary(&self) -> ProcessSummary {
        ProcessSummary {
            id: self.id,
            name: self.name.clone(),
            user: self.user.clone(),
            state: self.state,
            block_position: self.block_position(),
        }
    }
}

/// Serializable view of a process
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    pub id: ProcessId,
    pub name: String,
    pub user: String,
    pub state: ProcessState,
    pub block_position: BlockAddr,
}
