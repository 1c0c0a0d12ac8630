//! Bounded feed of recent write results.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::WriteReport;

/// Ring buffer of the most recent successful writes.
///
/// When full, pushing evicts the oldest unread report. The feed is for
/// observability only; nothing in the engine reads it back.
#[derive(Debug)]
pub struct ResultFeed {
    capacity: usize,
    reports: Mutex<VecDeque<WriteReport>>,
    evicted: AtomicU64,
}

impl ResultFeed {
    /// Creates a feed holding at most `capacity` reports.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            reports: Mutex::new(VecDeque::with_capacity(capacity)),
            evicted: AtomicU64::new(0),
        }
    }

    /// Maximum number of retained reports.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn push(&self, report: WriteReport) {
        if self.capacity == 0 {
            return;
        }
        let mut reports = self.reports.lock().unwrap();
        while reports.len() >= self.capacity {
            reports.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        reports.push_back(report);
    }

    /// Copies the retained reports, oldest first.
    pub fn recent(&self) -> Vec<WriteReport> {
        self.reports.lock().unwrap().iter().cloned().collect()
    }

    /// Removes and returns the retained reports, oldest first.
    pub fn take(&self) -> Vec<WriteReport> {
        self.reports.lock().unwrap().drain(..).collect()
    }

    /// Number of retained reports.
    pub fn len(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    /// Returns true if no report is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of reports evicted unread since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}
