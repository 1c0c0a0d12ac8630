//! Completion timestamps.
//!
//! The write dispatcher stamps every successful write with the time it
//! finished, read from a [`Clock`]. Production roots use [`SystemClock`];
//! tests plug in a clock they control.
//!
//! ```
//! use mirrordoc::{Clock, SystemClock};
//!
//! assert!(SystemClock.now_millis() > 0);
//! ```

use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(any(test, feature = "testing"))]
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

/// Source of completion timestamps.
pub trait Clock: Send + Sync + Debug {
    /// Milliseconds since Unix epoch.
    fn now_millis(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Formats a millisecond timestamp as RFC3339, e.g. for log fields.
pub fn rfc3339_from_millis(millis: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis as i64)
        .unwrap_or_default()
        .to_rfc3339()
}

/// Clock that only moves when told to.
///
/// Every reading returns the same instant until [`advance`](Self::advance)
/// is called, so reports stamped in one test step compare equal.
///
/// ```
/// use mirrordoc::{Clock, FixedClock};
///
/// let clock = FixedClock::new(1000);
/// assert_eq!(clock.now_millis(), 1000);
/// clock.advance(250);
/// assert_eq!(clock.now_millis(), 1250);
/// ```
#[cfg(any(test, feature = "testing"))]
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicU64,
}

#[cfg(any(test, feature = "testing"))]
impl FixedClock {
    pub fn new(millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(millis),
        }
    }

    /// Moves the clock forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.millis.fetch_add(ms, Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "testing"))]
impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}
