//! Error types for the write dispatcher.

use std::sync::Arc;

use thiserror::Error;

use super::OrderingKey;
use crate::store::StoreError;

/// A background write failed.
///
/// Delivered to the registered [`WriteObserver`](super::WriteObserver); when
/// no observer is registered it halts the write lane and is returned from
/// every later enqueue or drain on that key.
#[derive(Debug, Error)]
#[error("write '{label}' #{seq} for {key} failed")]
pub struct MirrorWriteError {
    /// Ordering key of the lane the write belonged to
    pub key: OrderingKey,
    /// Dispatcher sequence number of the write
    pub seq: u64,
    /// Operation name, e.g. `"push_each"`
    pub label: &'static str,
    /// The store error that caused the failure
    #[source]
    pub source: StoreError,
}

/// Errors returned by [`WriteDispatcher`](super::WriteDispatcher) calls.
#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The dispatcher was shut down and no longer accepts writes.
    #[error("Write dispatcher is closed")]
    Closed,

    /// A write on this key failed without an observer to handle it, so the
    /// lane stopped and discarded the writes queued behind it.
    #[error("Writes for {key} halted after a failed write")]
    Halted {
        /// The halted key
        key: OrderingKey,
        /// The failure that halted it
        #[source]
        cause: Arc<MirrorWriteError>,
    },
}

impl DispatchError {
    /// Check if this error means the dispatcher is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, DispatchError::Closed)
    }

    /// Check if this error reports a failed background write.
    pub fn is_write_failure(&self) -> bool {
        matches!(self, DispatchError::Halted { .. })
    }

    /// Get the write failure behind a halted lane.
    pub fn cause(&self) -> Option<&MirrorWriteError> {
        match self {
            DispatchError::Halted { cause, .. } => Some(cause),
            DispatchError::Closed => None,
        }
    }
}

impl From<DispatchError> for crate::Error {
    fn from(err: DispatchError) -> Self {
        crate::Error::Dispatch(err)
    }
}
