//! Configuration types for blocksim
//!
//! `SimConfig` is deserialized from a TOML file by the binary; every field
//! has a default so partial files are accepted.

use crate::error::{Error, Result};
use crate::types::{CachePolicy, SchedulingPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default number of blocks on the simulated device
pub const DEFAULT_TOTAL_BLOCKS: u64 = 100;

/// Default block payload size in bytes
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Default buffer cache capacity in entries
pub const DEFAULT_CACHE_CAPACITY: usize = 20;

/// Default simulated device service time per request
pub const DEFAULT_SERVICE_LATENCY_MS: u64 = 100;

/// Simulator configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of addressable blocks
    pub total_blocks: u64,
    /// Size of a cached block payload in bytes
    pub block_size: usize,
    /// Maximum number of resident cache entries
    pub cache_capacity: usize,
    /// Eviction policy of the buffer cache
    pub cache_policy: CachePolicy,
    /// Disk-head scheduling policy
    pub scheduling_policy: SchedulingPolicy,
    /// Simulated service time of a single request
    pub service_latency_ms: u64,
    /// Seed for every random source (random when unset)
    pub seed: Option<u64>,
    /// Where occupancy snapshots are written
    pub snapshot_path: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            total_blocks: DEFAULT_TOTAL_BLOCKS,
            block_size: DEFAULT_BLOCK_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_policy: CachePolicy::default(),
            scheduling_policy: SchedulingPolicy::default(),
            service_latency_ms: DEFAULT_SERVICE_LATENCY_MS,
            seed: None,
            snapshot_path: None,
        }
    }
}

impl SimConfig {
    /// Service latency as a `Duration`
    #[must_use]
    pub const fn service_latency(&self) -> Duration {
        Duration::from_millis(self.service_latency_ms)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.total_blocks == 0 {
            return Err(Error::Configuration("total_blocks must be > 0".into()));
        }
        if self.block_size == 0 {
            return Err(Error::Configuration("block_size must be > 0".into()));
        }
        if self.cache_capacity == 0 {
            return Err(Error::Configuration("cache_capacity must be > 0".into()));
        }
        Ok(())
    }
}
