//! Block occupancy and allocation
//!
//! This module provides:
//! - A bitmap tracking which blocks of the simulated device are in use
//! - A block -> owning file lookup kept in step with the bitmap
//! - Randomized, bounded-probe allocation that rolls back on failure

use crate::snapshot::DiskSnapshot;
use blocksim_common::{BlockAddr, Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Allocation gives up after `PROBE_FACTOR * total_blocks` random probes
pub const PROBE_FACTOR: u64 = 10;

/// Simulated block device occupancy
///
/// Uses one bit per block: 0 = free, 1 = used. Every used block has exactly
/// one owner entry, except transiently between [`BlockStore::restore`] and
/// the owner replay that follows it.
pub struct BlockStore<R = StdRng> {
    /// Bitmap data
    bitmap: Vec<u8>,
    /// Total number of blocks
    total_blocks: u64,
    /// Number of free blocks (cached)
    free_blocks: u64,
    /// Owning file of every used block
    owners: HashMap<BlockAddr, String>,
    /// Source of candidate addresses
    rng: R,
}

impl BlockStore<StdRng> {
    /// Create a store with all blocks free and an entropy-seeded generator
    #[must_use]
    pub fn new(total_blocks: u64) -> Self {
        Self::with_rng(total_blocks, StdRng::from_entropy())
    }

    /// Create a store whose allocation sequence is reproducible
    #[must_use]
    pub fn with_seed(total_blocks: u64, seed: u64) -> Self {
        Self::with_rng(total_blocks, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> BlockStore<R> {
    /// Create a store drawing candidate addresses from `rng`
    pub fn with_rng(total_blocks: u64, rng: R) -> Self {
        let bytes_needed = usize::try_from(total_blocks.div_ceil(8)).unwrap_or(usize::MAX);
        Self {
            bitmap: vec![0u8; bytes_needed],
            total_blocks,
            free_blocks: total_blocks,
            owners: HashMap::new(),
            rng,
        }
    }

    /// Check if a bit is set in a byte slice
    fn is_set_in_slice(data: &[u8], block: BlockAddr) -> bool {
        let byte_idx = (block / 8) as usize;
        let bit_idx = (block % 8) as u8;
        data[byte_idx] & (1 << bit_idx) != 0
    }

    /// Set a bit in a byte slice
    fn set_in_slice(data: &mut [u8], block: BlockAddr) {
        let byte_idx = (block / 8) as usize;
        let bit_idx = (block % 8) as u8;
        data[byte_idx] |= 1 << bit_idx;
    }

    /// Clear a bit in a byte slice
    fn clear_in_slice(data: &mut [u8], block: BlockAddr) {
        let byte_idx = (block / 8) as usize;
        let bit_idx = (block % 8) as u8;
        data[byte_idx] &= !(1 << bit_idx);
    }

    /// Check if a block is allocated (used)
    ///
    /// Out of range blocks are reported free; nothing can own them.
    #[must_use]
    pub fn is_allocated(&self, block: BlockAddr) -> bool {
        block < self.total_blocks && Self::is_set_in_slice(&self.bitmap, block)
    }

    /// Allocate `count` blocks for `owner`
    ///
    /// Candidates are drawn uniformly from `[0, total_blocks)`; a free one is
    /// claimed, a used one costs a probe. After `PROBE_FACTOR * total_blocks`
    /// probes the call fails and every block it claimed is released again, so
    /// callers never see a partial allocation.
    pub fn allocate(&mut self, count: u64, owner: &str) -> Result<Vec<BlockAddr>> {
        if count > self.free_blocks {
            warn!(
                file = owner,
                requested = count,
                free = self.free_blocks,
                "allocation exceeds free capacity"
            );
            return Err(self.allocation_failed(owner, count));
        }

        let max_attempts = self.total_blocks.saturating_mul(PROBE_FACTOR);
        let mut allocated = Vec::with_capacity(usize::try_from(count).unwrap_or_default());
        let mut attempts = 0u64;

        while (allocated.len() as u64) < count && attempts < max_attempts {
            let candidate = self.rng.gen_range(0..self.total_blocks);
            if !Self::is_set_in_slice(&self.bitmap, candidate) {
                Self::set_in_slice(&mut self.bitmap, candidate);
                self.free_blocks -= 1;
                self.owners.insert(candidate, owner.to_string());
                allocated.push(candidate);
            }
            attempts += 1;
        }

        if (allocated.len() as u64) < count {
            warn!(
                file = owner,
                requested = count,
                found = allocated.len(),
                attempts,
                "probe budget exhausted, rolling back"
            );
            self.release(&allocated);
            return Err(self.allocation_failed(owner, count));
        }

        debug!(file = owner, blocks = ?allocated, attempts, "allocated blocks");
        Ok(allocated)
    }

    fn allocation_failed(&self, owner: &str, requested: u64) -> Error {
        Error::AllocationFailed {
            file: owner.to_string(),
            requested,
            free: self.free_blocks,
        }
    }

    /// Release blocks back to the free pool
    ///
    /// Out of range and already free addresses are ignored.
    pub fn release(&mut self, blocks: &[BlockAddr]) {
        for &block in blocks {
            if self.is_allocated(block) {
                Self::clear_in_slice(&mut self.bitmap, block);
                self.free_blocks += 1;
                self.owners.remove(&block);
            }
        }
    }

    /// Name of the file owning `block`, if any
    #[must_use]
    pub fn owner_of(&self, block: BlockAddr) -> Option<&str> {
        self.owners.get(&block).map(String::as_str)
    }

    /// Record `owner` for `block` without the free-block check of `allocate`
    ///
    /// Used to rebuild the owner map after a snapshot load. The block is
    /// marked used if it was not already. Returns false for out of range
    /// addresses.
    pub fn register_owner(&mut self, block: BlockAddr, owner: &str) -> bool {
        if block >= self.total_blocks {
            return false;
        }
        if !Self::is_set_in_slice(&self.bitmap, block) {
            Self::set_in_slice(&mut self.bitmap, block);
            self.free_blocks -= 1;
        }
        self.owners.insert(block, owner.to_string());
        true
    }

    /// Free every block and forget every owner
    pub fn reset(&mut self) {
        self.bitmap.fill(0);
        self.owners.clear();
        self.free_blocks = self.total_blocks;
    }

    /// Get the number of free blocks
    #[must_use]
    pub const fn free_count(&self) -> u64 {
        self.free_blocks
    }

    /// Get the total number of blocks
    #[must_use]
    pub const fn total_count(&self) -> u64 {
        self.total_blocks
    }

    /// Get the number of allocated blocks
    #[must_use]
    pub const fn allocated_count(&self) -> u64 {
        self.total_blocks - self.free_blocks
    }

    /// Occupancy as one flag per block, `true` = used
    #[must_use]
    pub fn occupancy(&self) -> Vec<bool> {
        (0..self.total_blocks)
            .map(|block| Self::is_set_in_slice(&self.bitmap, block))
            .collect()
    }

    /// Capture the occupancy bitmap
    #[must_use]
    pub fn snapshot(&self) -> DiskSnapshot {
        DiskSnapshot::new(self.occupancy())
    }

    /// Replace the occupancy bitmap with a snapshot's
    ///
    /// The snapshot must be well formed and cover exactly this device;
    /// otherwise nothing changes. The owner map is cleared; callers replay
    /// each file's block list through [`BlockStore::register_owner`]
    /// afterwards.
    pub fn restore(&mut self, snapshot: &DiskSnapshot) -> Result<()> {
        snapshot.validate()?;
        if snapshot.total_blocks != self.total_blocks {
            return Err(Error::snapshot(format!(
                "snapshot covers {} blocks, device has {}",
                snapshot.total_blocks, self.total_blocks
            )));
        }

        self.bitmap.fill(0);
        self.owners.clear();
        let mut used = 0u64;
        for (block, _) in (0..).zip(&snapshot.occupied).filter(|(_, flag)| **flag) {
            Self::set_in_slice(&mut self.bitmap, block);
            used += 1;
        }
        self.free_blocks = self.total_blocks - used;

        debug!(used, total = self.total_blocks, "restored occupancy snapshot");
        Ok(())
    }
}
