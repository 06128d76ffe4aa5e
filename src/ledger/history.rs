use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use super::record::JobView;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Bounded trail of finished jobs, oldest first.
///
/// Entries are immutable copies, so only the ring itself needs a lock.
#[derive(Debug)]
pub struct HistoryRing {
    capacity: usize,
    entries: Mutex<VecDeque<JobView>>,
}

impl HistoryRing {
    /// A ring holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `entry`, evicting the oldest one first when full.
    pub fn push(&self, entry: JobView) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn snapshot(&self) -> Vec<JobView> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
