//! Pending request queue
//!
//! Keeps processes in submission order. Ordering decisions belong to the
//! scheduler, which may remove any member, not only the front.

use crate::request::IoProcess;
use blocksim_common::ProcessId;

/// Ordered collection of pending processes
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: Vec<IoProcess>,
}

impl RequestQueue {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Append a process behind everything already queued
    pub fn enqueue(&mut self, process: IoProcess) {
        self.pending.push(process);
    }

    /// Remove the process with `id`, wherever it sits
    pub fn dequeue(&mut self, id: ProcessId) -> Option<IoProcess> {
        let index = self.pending.iter().position(|p| p.id() == id)?;
        Some(self.pending.remove(index))
    }

    /// Remove the process at `index` in submission order
    pub(crate) fn take(&mut self, index: usize) -> Option<IoProcess> {
        (index < self.pending.len()).then(|| self.pending.remove(index))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// All pending processes, earliest submitted first
    #[must_use]
    pub fn peek_all(&self) -> &[IoProcess] {
        &self.pending
    }

    /// Remove and return every pending process
    pub fn drain(&mut self) -> Vec<IoProcess> {
        std::mem::take(&mut self.pending)
    }
}
