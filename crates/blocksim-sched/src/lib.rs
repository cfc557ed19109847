//! blocksim Scheduling
//!
//! Pending I/O is held as [`IoProcess`] entries in a [`RequestQueue`]. The
//! [`DiskScheduler`] picks the next one to serve from the current head
//! position under one of four policies:
//!
//! | Policy | Picks |
//! |--------|-------|
//! | FIFO   | earliest submitted |
//! | SSTF   | smallest seek distance in either direction |
//! | SCAN   | closest ahead in the sweep direction, reversing when none |
//! | C-SCAN | closest at or above the head, wrapping to the lowest address |
//!
//! Ties always go to the earliest submitted candidate.

pub mod queue;
pub mod request;
pub mod scheduler;

pub use queue::RequestQueue;
pub use request::{IoProcess, IoRequest, Payload, ProcessSummary};
pub use scheduler::{DiskScheduler, Selection};
