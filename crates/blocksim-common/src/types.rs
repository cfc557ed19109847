//! Core type definitions for blocksim
//!
//! Identifiers, operation kinds, process lifecycle states and the policy
//! enums shared between the scheduler, the buffer cache and the dispatcher.

use crate::error::Error;
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Block address on the simulated device, in `[0, total_blocks)`
pub type BlockAddr = u64;

/// Unique, monotonically issued process identifier
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[display("P{_0}")]
pub struct ProcessId(u64);

impl ProcessId {
    /// Create from a raw sequence number
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw sequence number
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// File operation carried by an I/O request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Delete,
    Update,
    Read,
}

impl Operation {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
            Self::Update => "UPDATE",
            Self::Read => "READ",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a scheduling unit
///
/// ```text
/// NEW -> READY -> RUNNING -> TERMINATED
///                    \-----> BLOCKED
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProcessState {
    #[default]
    New,
    Ready,
    Running,
    Terminated,
    Blocked,
}

impl ProcessState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Terminated => "TERMINATED",
            Self::Blocked => "BLOCKED",
        }
    }

    /// No transition leaves a terminal state
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::Blocked)
    }

    /// Check whether `self -> next` is a legal lifecycle step
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Ready)
                | (Self::Ready, Self::Running)
                | (Self::Running, Self::Terminated | Self::Blocked)
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disk-head scheduling policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingPolicy {
    /// First come, first served
    #[default]
    Fifo,
    /// Shortest seek time first
    Sstf,
    /// Elevator sweep, reversing at the last pending request
    Scan,
    /// Circular sweep, ascending only, wrapping to the lowest address
    #[serde(alias = "c-scan")]
    CScan,
}

impl SchedulingPolicy {
    pub const ALL: [Self; 4] = [Self::Fifo, Self::Sstf, Self::Scan, Self::CScan];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fifo => "FIFO",
            Self::Sstf => "SSTF",
            Self::Scan => "SCAN",
            Self::CScan => "C-SCAN",
        }
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" | "fcfs" => Ok(Self::Fifo),
            "sstf" => Ok(Self::Sstf),
            "scan" => Ok(Self::Scan),
            "cscan" | "c-scan" => Ok(Self::CScan),
            other => Err(Error::invalid_argument(format!(
                "unknown scheduling policy: {other}"
            ))),
        }
    }
}

/// Buffer cache eviction policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Evict the least recently used entry
    #[default]
    Lru,
    /// Evict the oldest inserted entry
    Fifo,
    /// Evict the least frequently used entry
    Lfu,
}

impl CachePolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lru => "LRU",
            Self::Fifo => "FIFO",
            Self::Lfu => "LFU",
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CachePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "fifo" => Ok(Self::Fifo),
            "lfu" => Ok(Self::Lfu),
            other => Err(Error::invalid_argument(format!(
                "unknown cache policy: {other}"
            ))),
        }
    }
}

/// Head sweep direction used by SCAN
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepDirection {
    /// Towards higher block addresses
    #[default]
    Ascending,
    /// Towards lower block addresses
    Descending,
}

impl SweepDirection {
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    /// Distance from `head` to `addr` if `addr` lies ahead in this direction
    #[must_use]
    pub const fn distance_ahead(self, head: BlockAddr, addr: BlockAddr) -> Option<u64> {
        match self {
            Self::Ascending if addr >= head => Some(addr - head),
            Self::Descending if addr <= head => Some(head - addr),
            _ => None,
        }
    }
}

impl fmt::Display for SweepDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => f.write_str("ascending"),
            Self::Descending => f.write_str("descending"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_state_transitions() {
        use ProcessState::*;
        assert!(New.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Running));
        assert!(Running.can_transition_to(Terminated));
        assert!(Running.can_transition_to(Blocked));

        assert!(!New.can_transition_to(Running));
        assert!(!Ready.can_transition_to(Blocked));
        for next in [New, Ready, Running, Terminated, Blocked] {
            assert!(!Terminated.can_transition_to(next));
            assert!(!Blocked.can_transition_to(next));
        }
        assert!(Terminated.is_terminal());
        assert!(Blocked.is_terminal());
        assert!(!Running.is_terminal());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("SSTF".parse::<SchedulingPolicy>().unwrap(), SchedulingPolicy::Sstf);
        assert_eq!("c-scan".parse::<SchedulingPolicy>().unwrap(), SchedulingPolicy::CScan);
        assert_eq!("cscan".parse::<SchedulingPolicy>().unwrap(), SchedulingPolicy::CScan);
        assert!("elevator".parse::<SchedulingPolicy>().is_err());

        assert_eq!("lfu".parse::<CachePolicy>().unwrap(), CachePolicy::Lfu);
        assert!("arc".parse::<CachePolicy>().is_err());
    }

    #[test]
    fn test_sweep_distance_ahead() {
        let up = SweepDirection::Ascending;
        assert_eq!(up.distance_ahead(10, 50), Some(40));
        assert_eq!(up.distance_ahead(10, 10), Some(0));
        assert_eq!(up.distance_ahead(10, 5), None);

        let down = up.reversed();
        assert_eq!(down, SweepDirection::Descending);
        assert_eq!(down.distance_ahead(10, 5), Some(5));
        assert_eq!(down.distance_ahead(10, 50), None);
    }

    #[test]
    fn test_process_id_display() {
        assert_eq!(ProcessId::new(7).to_string(), "P7");
        assert_eq!(ProcessId::from(3).get(), 3);
    }
}
