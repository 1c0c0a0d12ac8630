//! Completion observers.
//!
//! A [`WriteObserver`] is told about every finished write. For failures it
//! also decides what happens next: keep the lane running or halt it.

use tracing::{debug, error};

use super::{MirrorWriteError, WriteReport};

/// What the dispatcher does after a failed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Keep executing the writes queued behind the failed one.
    Continue,
    /// Stop the lane: discard its queued writes and reject new ones.
    Halt,
}

/// Receives write completions from a dispatcher.
///
/// Callbacks run on the dispatcher task and must not block.
pub trait WriteObserver: Send + Sync {
    /// Called after a write succeeded.
    fn on_success(&self, report: &WriteReport) {
        let _ = report;
    }

    /// Called after a write failed.
    fn on_failure(&self, error: &MirrorWriteError) -> FailureAction;
}

/// Observer that logs completions and keeps going after failures.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl WriteObserver for TracingObserver {
    fn on_success(&self, report: &WriteReport) {
        debug!(
            key = %report.key,
            seq = report.seq,
            label = report.label,
            matched = report.outcome.matched,
            modified = report.outcome.modified,
            completed_at = %report.completed_rfc3339(),
            "Write done"
        );
    }

    fn on_failure(&self, err: &MirrorWriteError) -> FailureAction {
        error!(key = %err.key, seq = err.seq, label = err.label, "Write failed: {}", err.source);
        FailureAction::Continue
    }
}
