//! Per-request execution results

use blocksim_common::BlockAddr;
use serde::Serialize;

/// How a file's blocks fared against the buffer cache
///
/// Derived from the individual `get` results of one operation, not from the
/// cache's cumulative counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheOutcome {
    /// Every block was resident
    AllHit { hits: u64 },
    /// No block was resident
    AllMiss { misses: u64 },
    /// Some blocks were resident
    Mixed { hits: u64, misses: u64 },
    /// The file owns no blocks
    Empty,
}

impl CacheOutcome {
    #[must_use]
    pub const fn classify(hits: u64, misses: u64) -> Self {
        match (hits, misses) {
            (0, 0) => Self::Empty,
            (hits, 0) => Self::AllHit { hits },
            (0, misses) => Self::AllMiss { misses },
            (hits, misses) => Self::Mixed { hits, misses },
        }
    }

    #[must_use]
    pub const fn hits(&self) -> u64 {
        match self {
            Self::AllHit { hits } | Self::Mixed { hits, .. } => *hits,
            Self::AllMiss { .. } | Self::Empty => 0,
        }
    }

    #[must_use]
    pub const fn misses(&self) -> u64 {
        match self {
            Self::AllMiss { misses } | Self::Mixed { misses, .. } => *misses,
            Self::AllHit { .. } | Self::Empty => 0,
        }
    }
}

/// What executing one request did
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ExecOutcome {
    /// New file; every block was a miss and loaded into the cache
    Created {
        blocks: Vec<BlockAddr>,
        misses: u64,
        /// Blocks of the new file still resident after loading
        resident: usize,
    },
    Updated { cache: CacheOutcome },
    Read { cache: CacheOutcome },
    /// File removed; its blocks were dropped from the cache and freed
    Deleted { released: Vec<BlockAddr> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(CacheOutcome::classify(0, 0), CacheOutcome::Empty);
        assert_eq!(CacheOutcome::classify(3, 0), CacheOutcome::AllHit { hits: 3 });
        assert_eq!(CacheOutcome::classify(0, 2), CacheOutcome::AllMiss { misses: 2 });
        assert_eq!(
            CacheOutcome::classify(1, 4),
            CacheOutcome::Mixed { hits: 1, misses: 4 }
        );
    }

    #[test]
    fn test_counts() {
        let mixed = CacheOutcome::classify(2, 5);
        assert_eq!(mixed.hits(), 2);
        assert_eq!(mixed.misses(), 5);
        assert_eq!(CacheOutcome::Empty.hits(), 0);
        assert_eq!(CacheOutcome::Empty.misses(), 0);
    }
}
