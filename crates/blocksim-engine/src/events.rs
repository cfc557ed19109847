//! Structured events emitted by the dispatcher
//!
//! The dispatcher reports what it does as [`Event`] values to an injected
//! [`EventSink`]. Turning events into audit lines, UI updates or metrics is
//! the sink's business.

use crate::outcome::CacheOutcome;
use blocksim_common::{
    BlockAddr, CachePolicy, Error, Operation, ProcessId, ProcessState, SchedulingPolicy,
};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

/// Why a request failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    AllocationFailed,
    TargetNotFound,
    DuplicateTarget,
    Other,
}

impl From<&Error> for FailureKind {
    fn from(err: &Error) -> Self {
        match err {
            Error::AllocationFailed { .. } => Self::AllocationFailed,
            Error::TargetNotFound { .. } => Self::TargetNotFound,
            Error::DuplicateTarget { .. } => Self::DuplicateTarget,
            _ => Self::Other,
        }
    }
}

/// Something the dispatcher did
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    ProcessSubmitted {
        pid: ProcessId,
        operation: Operation,
        file: String,
        user: String,
        block_position: BlockAddr,
    },
    RequestScheduled {
        pid: ProcessId,
        policy: SchedulingPolicy,
        previous_head: BlockAddr,
        head: BlockAddr,
        seek_distance: u64,
        reversed: bool,
        wrapped: bool,
    },
    FileCreated {
        pid: ProcessId,
        user: String,
        path: String,
        file: String,
        blocks: Vec<BlockAddr>,
        misses: u64,
        resident: usize,
    },
    FileUpdated {
        pid: ProcessId,
        user: String,
        file: String,
        cache: CacheOutcome,
    },
    FileRead {
        pid: ProcessId,
        user: String,
        file: String,
        cache: CacheOutcome,
    },
    FileDeleted {
        pid: ProcessId,
        user: String,
        file: String,
        released: u64,
    },
    RequestFailed {
        pid: ProcessId,
        file: String,
        kind: FailureKind,
    },
    ProcessFinished {
        pid: ProcessId,
        state: ProcessState,
    },
    PolicyChanged {
        policy: SchedulingPolicy,
    },
    CachePolicyChanged {
        policy: CachePolicy,
    },
    SnapshotSaved {
        used_blocks: u64,
    },
    SnapshotLoaded {
        used_blocks: u64,
        owners_registered: u64,
    },
    Wiped {
        dropped_requests: usize,
    },
}

/// Receiver of dispatcher events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// Default sink: forwards every event to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &Event) {
        match event {
            Event::ProcessSubmitted {
                pid,
                operation,
                file,
                user,
                block_position,
            } => info!(%pid, %operation, %file, %user, block_position, "process submitted"),
            Event::RequestScheduled {
                pid,
                policy,
                previous_head,
                head,
                seek_distance,
                reversed,
                wrapped,
            } => info!(
                %pid,
                %policy,
                previous_head,
                head,
                seek_distance,
                reversed,
                wrapped,
                "request scheduled"
            ),
            Event::FileCreated {
                pid,
                user,
                path,
                file,
                blocks,
                misses,
                resident,
            } => info!(%pid, %user, %path, %file, ?blocks, misses, resident, "file created"),
            Event::FileUpdated {
                pid,
                user,
                file,
                cache,
            } => info!(%pid, %user, %file, ?cache, "file updated"),
            Event::FileRead {
                pid,
                user,
                file,
                cache,
            } => info!(%pid, %user, %file, ?cache, "file read"),
            Event::FileDeleted {
                pid,
                user,
                file,
                released,
            } => info!(%pid, %user, %file, released, "file deleted"),
            Event::RequestFailed { pid, file, kind } => {
                warn!(%pid, %file, ?kind, "request failed");
            }
            Event::ProcessFinished { pid, state } => info!(%pid, %state, "process finished"),
            Event::PolicyChanged { policy } => info!(%policy, "scheduling policy changed"),
            Event::CachePolicyChanged { policy } => info!(%policy, "cache policy changed"),
            Event::SnapshotSaved { used_blocks } => info!(used_blocks, "snapshot saved"),
            Event::SnapshotLoaded {
                used_blocks,
                owners_registered,
            } => info!(used_blocks, owners_registered, "snapshot loaded"),
            Event::Wiped { dropped_requests } => info!(dropped_requests, "device wiped"),
        }
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &Event) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.emit(&Event::PolicyChanged {
            policy: SchedulingPolicy::Scan,
        });
        sink.emit(&Event::Wiped {
            dropped_requests: 2,
        });

        assert_eq!(sink.events().len(), 2);
        let taken = sink.take();
        assert_eq!(
            taken[0],
            Event::PolicyChanged {
                policy: SchedulingPolicy::Scan
            }
        );
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_event_json_shape() {
        let event = Event::RequestScheduled {
            pid: ProcessId::new(3),
            policy: SchedulingPolicy::CScan,
            previous_head: 95,
            head: 10,
            seek_distance: 85,
            reversed: false,
            wrapped: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "request_scheduled");
        assert_eq!(json["policy"], "cscan");
        assert_eq!(json["pid"], 3);
        assert_eq!(json["wrapped"], true);
    }

    #[test]
    fn test_failure_kind_from_error() {
        let err = Error::TargetNotFound {
            path: "/x".into(),
            file: "f".into(),
        };
        assert_eq!(FailureKind::from(&err), FailureKind::TargetNotFound);
        assert_eq!(
            FailureKind::from(&Error::snapshot("x")),
            FailureKind::Other
        );
    }

    #[test]
    fn test_tracing_sink_accepts_every_event() {
        let sink = TracingSink;
        sink.emit(&Event::FileRead {
            pid: ProcessId::new(1),
            user: "u".into(),
            file: "f".into(),
            cache: CacheOutcome::Empty,
        });
        sink.emit(&Event::RequestFailed {
            pid: ProcessId::new(1),
            file: "f".into(),
            kind: FailureKind::AllocationFailed,
        });
    }
}
