//! blocksim Storage Engine - Simulated block device
//!
//! This crate implements the storage side of the simulator:
//! - Bitmap block occupancy with an owner lookup
//! - Bounded randomized allocation with rollback on failure
//! - Buffer cache with pluggable eviction (LRU, FIFO, LFU)
//! - Versioned occupancy snapshots

pub mod block;
pub mod cache;
pub mod snapshot;

// Re-exports
pub use block::{BlockStore, PROBE_FACTOR};
pub use cache::{BufferCache, CacheEntry, CacheStats};
pub use snapshot::{DiskSnapshot, SNAPSHOT_VERSION};
