//! blocksim Engine
//!
//! Ties the pieces of the simulated disk-access layer together.
//!
//! # Architecture
//!
//! ```text
//! submit() ──► RequestQueue ──► DiskScheduler ──► Dispatcher::execute
//!                                (FIFO/SSTF/      ├─ BlockStore  (allocate/release)
//!                                 SCAN/C-SCAN)    └─ BufferCache (get/put/remove)
//! ```
//!
//! One request is served per [`Dispatcher::run_one_cycle`] call. A second
//! call while one is in flight returns [`Cycle::Busy`] without doing
//! anything. Directory and file metadata live behind the [`Namespace`]
//! trait; notable state changes are reported to an [`EventSink`].

pub mod dispatch;
pub mod events;
pub mod namespace;
pub mod outcome;

pub use dispatch::{Cycle, Dispatcher, Served};
pub use events::{Event, EventSink, FailureKind, RecordingSink, TracingSink};
pub use namespace::{DirHandle, MemoryNamespace, Namespace};
pub use outcome::{CacheOutcome, ExecOutcome};
