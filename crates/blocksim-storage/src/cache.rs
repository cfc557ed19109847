//! Buffer cache in front of the simulated device
//!
//! Fixed-capacity map from block address to block contents. When a new
//! block arrives at capacity, one resident entry is evicted according to
//! the configured [`CachePolicy`].

use blocksim_common::{BlockAddr, CachePolicy};
use bytes::Bytes;
use std::collections::HashMap;
use tracing::debug;

/// Individual cache entry with recency and frequency tracking
#[derive(Clone, Debug)]
pub struct CacheEntry {
    /// Cached block
    pub block: BlockAddr,
    /// File the block belongs to
    pub owner: String,
    /// Block data
    pub data: Bytes,
    /// Clock value at first insertion
    inserted_at: u64,
    /// Clock value of the last hit or overwrite
    last_access: u64,
    /// Number of hits and overwrites since insertion
    accesses: u64,
}

impl CacheEntry {
    fn new(block: BlockAddr, owner: String, data: Bytes, clock: u64) -> Self {
        Self {
            block,
            owner,
            data,
            inserted_at: clock,
            last_access: clock,
            accesses: 0,
        }
    }

    fn touch(&mut self, clock: u64) {
        self.last_access = clock;
        self.accesses += 1;
    }

    /// Clock value of the most recent access
    #[must_use]
    pub const fn last_access(&self) -> u64 {
        self.last_access
    }

    /// Hits and overwrites since insertion
    #[must_use]
    pub const fn accesses(&self) -> u64 {
        self.accesses
    }

    /// Eviction rank under `policy`; the smallest rank is evicted first
    const fn rank(&self, policy: CachePolicy) -> (u64, u64, u64) {
        match policy {
            CachePolicy::Lru => (self.last_access, self.inserted_at, 0),
            CachePolicy::Fifo => (self.inserted_at, 0, 0),
            CachePolicy::Lfu => (self.accesses, self.last_access, self.inserted_at),
        }
    }
}

/// Cache statistics for reporting
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of entries evicted to make room
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Block buffer cache with a switchable eviction policy
pub struct BufferCache {
    /// Resident entries keyed by block address
    entries: HashMap<BlockAddr, CacheEntry>,
    /// Maximum number of entries
    capacity: usize,
    /// Logical clock for recency ordering
    clock: u64,
    /// Cache statistics
    stats: CacheStats,
    /// Eviction policy
    policy: CachePolicy,
}

impl BufferCache {
    /// Create a new cache holding at most `capacity` blocks
    #[must_use]
    pub fn new(capacity: usize, policy: CachePolicy) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
            clock: 0,
            stats: CacheStats::default(),
            policy,
        }
    }

    /// Get the eviction policy
    #[must_use]
    pub const fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Switch the eviction policy; resident entries are kept
    pub fn set_policy(&mut self, policy: CachePolicy) {
        self.policy = policy;
    }

    /// Get the maximum number of entries
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get cache statistics
    #[must_use]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Get the current number of entries in the cache
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advance the logical clock and return the new value
    const fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Look up a block, counting a hit or a miss
    ///
    /// A hit refreshes the entry's recency. A miss loads nothing; the caller
    /// decides whether to `put` the block.
    pub fn get(&mut self, block: BlockAddr) -> Option<&CacheEntry> {
        let clock = self.tick();
        match self.entries.get_mut(&block) {
            Some(entry) => {
                entry.touch(clock);
                self.stats.hits += 1;
                Some(&*entry)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert or overwrite a block
    ///
    /// An existing entry gets the new contents and a refreshed recency. A new
    /// entry at capacity first evicts one victim chosen by the policy.
    pub fn put(&mut self, block: BlockAddr, owner: &str, data: Bytes) {
        let clock = self.tick();

        if let Some(entry) = self.entries.get_mut(&block) {
            entry.owner = owner.to_string();
            entry.data = data;
            entry.touch(clock);
            return;
        }

        // Evict if at capacity
        while self.entries.len() >= self.capacity {
            let Some(victim) = self.find_victim() else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&victim) {
                self.stats.evictions += 1;
                debug!(
                    block = victim,
                    owner = %evicted.owner,
                    policy = %self.policy,
                    "evicted cache entry"
                );
            }
        }

        if self.capacity > 0 {
            self.entries
                .insert(block, CacheEntry::new(block, owner.to_string(), data, clock));
        }
    }

    /// Replace a resident block's contents in place
    ///
    /// Recency, access count and statistics are left alone; pair with a
    /// preceding `get` hit. Returns false if the block is not resident.
    pub fn overwrite(&mut self, block: BlockAddr, data: Bytes) -> bool {
        self.entries.get_mut(&block).is_some_and(|entry| {
            entry.data = data;
            true
        })
    }

    /// Remove a block; absent blocks are ignored
    pub fn remove(&mut self, block: BlockAddr) -> Option<CacheEntry> {
        self.entries.remove(&block)
    }

    /// Check if a block is resident without touching statistics or recency
    #[must_use]
    pub fn contains(&self, block: BlockAddr) -> bool {
        self.entries.contains_key(&block)
    }

    /// Peek at a resident entry without touching statistics or recency
    #[must_use]
    pub fn peek(&self, block: BlockAddr) -> Option<&CacheEntry> {
        self.entries.get(&block)
    }

    /// Resident block addresses in ascending order
    #[must_use]
    pub fn resident_blocks(&self) -> Vec<BlockAddr> {
        let mut blocks: Vec<_> = self.entries.keys().copied().collect();
        blocks.sort_unstable();
        blocks
    }

    /// Find the entry the current policy would evict next
    fn find_victim(&self) -> Option<BlockAddr> {
        self.entries
            .values()
            .min_by_key(|entry| entry.rank(self.policy))
            .map(|entry| entry.block)
    }

    /// Drop every entry and reset statistics
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.reset();
    }
}
