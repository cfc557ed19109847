//! Disk-head scheduler
//!
//! Holds the policy, the head position and the SCAN sweep direction, and
//! removes the next process to serve from a [`RequestQueue`]. After every
//! selection the head sits at the selected request's block position.

use crate::queue::RequestQueue;
use crate::request::IoProcess;
use blocksim_common::{BlockAddr, SchedulingPolicy, SweepDirection};
use tracing::{debug, info};

/// Result of one scheduling decision
#[derive(Clone, Debug)]
pub struct Selection {
    /// Process removed from the queue
    pub process: IoProcess,
    /// Policy that made the decision
    pub policy: SchedulingPolicy,
    /// Head position before the move
    pub previous_head: BlockAddr,
    /// Head position after the move
    pub head: BlockAddr,
    /// `|head - previous_head|`
    pub seek_distance: u64,
    /// SCAN reversed its sweep direction to find this candidate
    pub reversed: bool,
    /// C-SCAN found nothing ahead and restarted from block 0
    pub wrapped: bool,
}

/// Index into the queue plus the distance that won
type Candidate = (usize, u64);

/// Disk-head scheduler state
#[derive(Debug, Clone)]
pub struct DiskScheduler {
    policy: SchedulingPolicy,
    head: BlockAddr,
    direction: SweepDirection,
    /// Cumulative head movement over all selections
    total_seek: u64,
}

impl Default for DiskScheduler {
    fn default() -> Self {
        Self::new(SchedulingPolicy::default())
    }
}

impl DiskScheduler {
    /// Create a scheduler with the head at block 0, sweeping ascending
    #[must_use]
    pub fn new(policy: SchedulingPolicy) -> Self {
        Self::with_head(policy, 0, SweepDirection::Ascending)
    }

    /// Create a scheduler with an explicit head state
    #[must_use]
    pub fn with_head(policy: SchedulingPolicy, head: BlockAddr, direction: SweepDirection) -> Self {
        info!(%policy, head, %direction, "disk scheduler initialized");
        Self {
            policy,
            head,
            direction,
            total_seek: 0,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    /// Takes effect on the next selection; the queue and head are untouched
    pub fn set_policy(&mut self, policy: SchedulingPolicy) {
        self.policy = policy;
    }

    /// Block address of the most recently served request
    #[must_use]
    pub const fn head(&self) -> BlockAddr {
        self.head
    }

    #[must_use]
    pub const fn direction(&self) -> SweepDirection {
        self.direction
    }

    /// Sum of all seek distances so far
    #[must_use]
    pub const fn total_seek(&self) -> u64 {
        self.total_seek
    }

    /// Remove and return the next process to serve
    ///
    /// An empty queue yields `None` and leaves all state unchanged.
    pub fn select_next(&mut self, queue: &mut RequestQueue) -> Option<Selection> {
        if queue.is_empty() {
            return None;
        }

        let previous_head = self.head;
        let mut reversed = false;
        let mut wrapped = false;

        let candidate = match self.policy {
            SchedulingPolicy::Fifo => Some((0, 0)),
            SchedulingPolicy::Sstf => {
                closest(queue.peek_all(), |addr| Some(addr.abs_diff(previous_head)))
            }
            SchedulingPolicy::Scan => {
                let (found, flipped) = self.scan(queue.peek_all());
                reversed = flipped;
                found
            }
            SchedulingPolicy::CScan => {
                let (found, wrap) = Self::cscan(queue.peek_all(), previous_head);
                wrapped = wrap;
                found
            }
        };

        let (index, _) = candidate?;
        let process = queue.take(index)?;
        let head = process.block_position();
        let seek_distance = head.abs_diff(previous_head);

        self.head = head;
        self.total_seek += seek_distance;

        debug!(
            policy = %self.policy,
            pid = %process.id(),
            from = previous_head,
            to = head,
            seek_distance,
            reversed,
            wrapped,
            "selected request"
        );

        Some(Selection {
            process,
            policy: self.policy,
            previous_head,
            head,
            seek_distance,
            reversed,
            wrapped,
        })
    }

    /// Closest candidate ahead in the sweep direction, reversing at most once
    fn scan(&mut self, pending: &[IoProcess]) -> (Option<Candidate>, bool) {
        let head = self.head;
        for attempt in 0..2 {
            let direction = self.direction;
            if let Some(found) = closest(pending, |addr| direction.distance_ahead(head, addr)) {
                return (Some(found), attempt > 0);
            }
            if attempt == 0 {
                self.direction = direction.reversed();
            }
        }
        // Unreachable for a non-empty queue: every address lies on one side
        (None, true)
    }

    /// Closest candidate at or above the head, else the lowest address overall
    fn cscan(pending: &[IoProcess], head: BlockAddr) -> (Option<Candidate>, bool) {
        let ahead = closest(pending, |addr| addr.checked_sub(head));
        if ahead.is_some() {
            return (ahead, false);
        }
        (closest(pending, Some), true)
    }
}

/// First process in queue order minimising `distance`
///
/// `distance` returns `None` for addresses that are not eligible.
fn closest(
    pending: &[IoProcess],
    distance: impl Fn(BlockAddr) -> Option<u64>,
) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for (index, process) in pending.iter().enumerate() {
        let Some(d) = distance(process.block_position()) else {
            continue;
        };
        if best.is_none_or(|(_, best_d)| d < best_d) {
            best = Some((index, d));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{IoRequest, Payload};
    use blocksim_common::{Operation, ProcessId};

    fn queue_of(positions: &[BlockAddr]) -> RequestQueue {
        let mut queue = RequestQueue::new();
        for (i, &pos) in positions.iter().enumerate() {
            let id = i as u64 + 1;
            let request =
                IoRequest::new(Operation::Read, "/", format!("f{id}"), Payload::None, pos).unwrap();
            queue.enqueue(IoProcess::new(ProcessId::new(id), request, "test"));
        }
        queue
    }

    fn drain_order(scheduler: &mut DiskScheduler, queue: &mut RequestQueue) -> Vec<BlockAddr> {
        std::iter::from_fn(|| scheduler.select_next(queue))
            .map(|s| s.head)
            .collect()
    }

    #[test]
    fn test_empty_queue_has_no_side_effects() {
        let mut scheduler = DiskScheduler::with_head(SchedulingPolicy::Scan, 40, SweepDirection::Descending);
        let mut queue = RequestQueue::new();
        assert!(scheduler.select_next(&mut queue).is_none());
        assert_eq!(scheduler.head(), 40);
        assert_eq!(scheduler.direction(), SweepDirection::Descending);
        assert_eq!(scheduler.total_seek(), 0);
    }

    #[test]
    fn test_fifo_serves_submission_order() {
        let mut scheduler = DiskScheduler::new(SchedulingPolicy::Fifo);
        let mut queue = queue_of(&[50, 10, 90]);

        let first = scheduler.select_next(&mut queue).unwrap();
        assert_eq!(first.process.id(), ProcessId::new(1));
        assert_eq!(scheduler.head(), 50);

        let rest: Vec<_> = queue.peek_all().iter().map(IoProcess::block_position).collect();
        assert_eq!(rest, vec![10, 90]);
        assert_eq!(drain_order(&mut scheduler, &mut queue), vec![10, 90]);
    }

    #[test]
    fn test_sstf_minimises_seek() {
        let mut scheduler = DiskScheduler::with_head(SchedulingPolicy::Sstf, 53, SweepDirection::Ascending);
        let mut queue = queue_of(&[98, 183, 37, 122, 14, 124, 65, 67]);
        assert_eq!(
            drain_order(&mut scheduler, &mut queue),
            vec![65, 67, 37, 14, 98, 122, 124, 183]
        );
        assert_eq!(scheduler.total_seek(), 236);
    }

    #[test]
    fn test_sstf_selection_is_never_farther_than_any_candidate() {
        let positions = [12, 77, 3, 45, 45, 99, 60];
        let mut scheduler = DiskScheduler::with_head(SchedulingPolicy::Sstf, 50, SweepDirection::Ascending);
        let mut queue = queue_of(&positions);
        while !queue.is_empty() {
            let before = scheduler.head();
            let candidates: Vec<_> = queue.peek_all().iter().map(IoProcess::block_position).collect();
            let selected = scheduler.select_next(&mut queue).unwrap();
            for c in candidates {
                assert!(selected.head.abs_diff(before) <= c.abs_diff(before));
            }
        }
    }

    #[test]
    fn test_sstf_tie_goes_to_earliest() {
        let mut scheduler = DiskScheduler::with_head(SchedulingPolicy::Sstf, 50, SweepDirection::Ascending);
        let mut queue = queue_of(&[60, 40]);
        let selected = scheduler.select_next(&mut queue).unwrap();
        assert_eq!(selected.process.id(), ProcessId::new(1));
        assert_eq!(selected.head, 60);
    }

    #[test]
    fn test_scan_ascending_from_zero() {
        let mut scheduler = DiskScheduler::new(SchedulingPolicy::Scan);
        let mut queue = queue_of(&[50, 10, 90]);
        assert_eq!(drain_order(&mut scheduler, &mut queue), vec![10, 50, 90]);
        assert_eq!(scheduler.direction(), SweepDirection::Ascending);
    }

    #[test]
    fn test_scan_reverses_once() {
        let mut scheduler = DiskScheduler::with_head(SchedulingPolicy::Scan, 60, SweepDirection::Ascending);
        let mut queue = queue_of(&[50, 10, 90]);

        let first = scheduler.select_next(&mut queue).unwrap();
        assert_eq!(first.head, 90);
        assert!(!first.reversed);

        let second = scheduler.select_next(&mut queue).unwrap();
        assert_eq!(second.head, 50);
        assert!(second.reversed);
        assert_eq!(scheduler.direction(), SweepDirection::Descending);

        let third = scheduler.select_next(&mut queue).unwrap();
        assert_eq!(third.head, 10);
        assert!(!third.reversed);
        assert_eq!(scheduler.direction(), SweepDirection::Descending);
    }

    #[test]
    fn test_scan_direction_predicate() {
        let positions = [5, 95, 40, 41, 70, 0, 99, 60];
        let mut scheduler = DiskScheduler::with_head(SchedulingPolicy::Scan, 50, SweepDirection::Descending);
        let mut queue = queue_of(&positions);
        while !queue.is_empty() {
            let before_head = scheduler.head();
            let before_dir = scheduler.direction();
            let selected = scheduler.select_next(&mut queue).unwrap();
            if selected.reversed {
                assert_eq!(scheduler.direction(), before_dir.reversed());
                assert!(before_dir.reversed().distance_ahead(before_head, selected.head).is_some());
            } else {
                assert_eq!(scheduler.direction(), before_dir);
                assert!(before_dir.distance_ahead(before_head, selected.head).is_some());
            }
        }
    }

    #[test]
    fn test_scan_serves_request_at_head() {
        let mut scheduler = DiskScheduler::with_head(SchedulingPolicy::Scan, 30, SweepDirection::Descending);
        let mut queue = queue_of(&[30, 31]);
        assert_eq!(drain_order(&mut scheduler, &mut queue), vec![30, 31]);
    }

    #[test]
    fn test_cscan_wraps_to_lowest() {
        let mut scheduler = DiskScheduler::with_head(SchedulingPolicy::CScan, 95, SweepDirection::Descending);
        let mut queue = queue_of(&[50, 10, 90]);

        let first = scheduler.select_next(&mut queue).unwrap();
        assert!(first.wrapped);
        assert_eq!(first.head, 10);

        let second = scheduler.select_next(&mut queue).unwrap();
        assert!(!second.wrapped);
        assert_eq!(second.head, 50);

        let third = scheduler.select_next(&mut queue).unwrap();
        assert_eq!(third.head, 90);

        // C-SCAN never consults or moves the sweep direction
        assert_eq!(scheduler.direction(), SweepDirection::Descending);
    }

    #[test]
    fn test_cscan_ascends_then_wraps() {
        let mut scheduler = DiskScheduler::with_head(SchedulingPolicy::CScan, 50, SweepDirection::Ascending);
        let mut queue = queue_of(&[20, 80, 50, 5, 65]);
        assert_eq!(drain_order(&mut scheduler, &mut queue), vec![50, 65, 80, 5, 20]);
    }

    #[test]
    fn test_policy_switch_keeps_head_and_queue() {
        let mut scheduler = DiskScheduler::new(SchedulingPolicy::Fifo);
        let mut queue = queue_of(&[70, 20, 65]);

        scheduler.select_next(&mut queue).unwrap();
        assert_eq!(scheduler.head(), 70);

        scheduler.set_policy(SchedulingPolicy::Sstf);
        assert_eq!(scheduler.head(), 70);
        assert_eq!(queue.len(), 2);

        let next = scheduler.select_next(&mut queue).unwrap();
        assert_eq!(next.policy, SchedulingPolicy::Sstf);
        assert_eq!(next.head, 65);
    }
}
