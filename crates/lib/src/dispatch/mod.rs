//! Background write dispatcher.
//!
//! [`WriteDispatcher`] accepts store writes from synchronous callers and runs
//! them on a background task. Writes are grouped into lanes by
//! [`OrderingKey`]:
//!
//! - at most one write per key executes at a time, in the order it was
//!   enqueued, regardless of priority;
//! - different keys run concurrently, optionally capped by
//!   `max_in_flight`, in which case the [`Priority`] of each lane's head
//!   decides which key goes next;
//! - successes land in a bounded [`ResultFeed`] and are passed to the
//!   [`WriteObserver`], failures go to the observer only. Without an
//!   observer a failure halts its lane.
//!
//! The dispatcher handle is cheap to clone. When the last handle is dropped
//! the background task finishes every queued write and exits.
//!
//! ```
//! # use std::sync::Arc;
//! # use mirrordoc::dispatch::{DispatcherOptions, OrderingKey, Priority, WriteDispatcher};
//! # use mirrordoc::store::{DocumentStore, Filter, InMemory};
//! # #[tokio::main]
//! # async fn main() -> mirrordoc::Result<()> {
//! let store = Arc::new(InMemory::new());
//! let dispatcher = WriteDispatcher::start(DispatcherOptions::default());
//! let key = OrderingKey::new("doc-x");
//!
//! let writer = store.clone();
//! dispatcher.enqueue(
//!     Box::pin(async move {
//!         writer.set_field(&Filter::new().eq("id", "x"), "a", 1.into(), true).await
//!     }),
//!     &key,
//!     Priority::NORMAL,
//!     "set_field",
//! )?;
//!
//! dispatcher.drain(&key).await?;
//! assert_eq!(store.find_one(&Filter::new().eq("id", "x"), "a").await?, Some(1.into()));
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use handle_trait::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use crate::{
    Clock, Result, SystemClock,
    config::MirrorConfig,
    constants::{DEFAULT_PRIORITY, DEFAULT_RESULT_CAPACITY},
    store::{StoreResult, WriteOutcome},
};

mod errors;
mod observer;
mod results;
mod scheduler;

pub use errors::{DispatchError, MirrorWriteError};
pub use observer::{FailureAction, TracingObserver, WriteObserver};
pub use results::ResultFeed;

use scheduler::{Command, Job, Scheduler};

/// A unit of work performing one remote update.
pub type WriteOp = Pin<Box<dyn Future<Output = StoreResult<WriteOutcome>> + Send + 'static>>;

/// Identifies a write lane; writes sharing a key never overlap and run in
/// issue order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderingKey(String);

impl OrderingKey {
    /// Creates a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderingKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Scheduling priority across keys; higher runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub u32);

impl Priority {
    pub const LOW: Priority = Priority(0);
    pub const NORMAL: Priority = Priority(DEFAULT_PRIORITY);
    pub const HIGH: Priority = Priority(10);
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// Record of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    /// Lane the write ran on
    pub key: OrderingKey,
    /// Dispatcher sequence number
    pub seq: u64,
    /// Operation name
    pub label: &'static str,
    /// What the store reported
    pub outcome: WriteOutcome,
    /// Completion time in milliseconds since Unix epoch
    pub completed_at: u64,
}

impl WriteReport {
    /// Completion time as an RFC3339 string.
    pub fn completed_rfc3339(&self) -> String {
        crate::clock::rfc3339_from_millis(self.completed_at)
    }
}

/// Settings for a new dispatcher.
#[derive(Clone)]
pub struct DispatcherOptions {
    /// Capacity of the recent-results feed
    pub result_capacity: usize,
    /// Maximum number of writes running at once across all keys; 0 means
    /// unlimited
    pub max_in_flight: usize,
    /// Completion observer
    pub observer: Option<Arc<dyn WriteObserver>>,
    /// Clock stamping completed writes
    pub clock: Arc<dyn Clock>,
}

impl DispatcherOptions {
    /// Options taken from a [`MirrorConfig`].
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self {
            result_capacity: config.result_capacity,
            max_in_flight: config.max_in_flight,
            ..Self::default()
        }
    }

    /// Sets the completion observer.
    pub fn with_observer(mut self, observer: Arc<dyn WriteObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Sets the recent-results capacity.
    pub fn with_result_capacity(mut self, capacity: usize) -> Self {
        self.result_capacity = capacity;
        self
    }

    /// Caps the number of concurrently running writes across keys.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Sets the clock stamping completed writes.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            result_capacity: DEFAULT_RESULT_CAPACITY,
            max_in_flight: 0,
            observer: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for DispatcherOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherOptions")
            .field("result_capacity", &self.result_capacity)
            .field("max_in_flight", &self.max_in_flight)
            .field("observer", &self.observer.as_ref().map(|_| "<observer>"))
            .field("clock", &self.clock)
            .finish()
    }
}

/// State shared between dispatcher handles and the background task.
#[derive(Debug)]
pub(crate) struct SharedState {
    results: ResultFeed,
    halted: Mutex<HashMap<OrderingKey, Arc<MirrorWriteError>>>,
    pending: Mutex<HashMap<OrderingKey, usize>>,
    closed: AtomicBool,
}

impl SharedState {
    fn halted_cause(&self, key: &OrderingKey) -> Option<Arc<MirrorWriteError>> {
        self.halted.lock().unwrap().get(key).cloned()
    }

    fn halted_error(&self, key: &OrderingKey) -> Option<DispatchError> {
        self.halted_cause(key).map(|cause| DispatchError::Halted {
            key: key.clone(),
            cause,
        })
    }

    pub(crate) fn mark_halted(&self, key: &OrderingKey, cause: Arc<MirrorWriteError>) {
        self.halted.lock().unwrap().insert(key.clone(), cause);
    }

    fn add_pending(&self, key: &OrderingKey) {
        *self.pending.lock().unwrap().entry(key.clone()).or_default() += 1;
    }

    pub(crate) fn finish_pending(&self, key: &OrderingKey, count: usize) {
        let mut pending = self.pending.lock().unwrap();
        if let Some(n) = pending.get_mut(key) {
            *n = n.saturating_sub(count);
            if *n == 0 {
                pending.remove(key);
            }
        }
    }
}

struct DispatcherInner {
    commands: mpsc::UnboundedSender<Command>,
    /// Issue counter; held while sending so sequence numbers follow
    /// channel order.
    next_seq: Mutex<u64>,
    shared: Arc<SharedState>,
}

/// Handle to a background write dispatcher.
#[derive(Clone, Handle)]
pub struct WriteDispatcher {
    inner: Arc<DispatcherInner>,
}

impl WriteDispatcher {
    /// Starts a dispatcher on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn start(options: DispatcherOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(SharedState {
            results: ResultFeed::new(options.result_capacity),
            halted: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });

        let scheduler = Scheduler::new(rx, shared.clone(), &options);
        tokio::spawn(scheduler.run());

        Self {
            inner: Arc::new(DispatcherInner {
                commands: tx,
                next_seq: Mutex::new(0),
                shared,
            }),
        }
    }

    /// Schedules `op` on the lane for `key` and returns its sequence number.
    ///
    /// Never blocks on the write itself. Fails if the dispatcher is closed or
    /// the lane was halted by an unobserved failure.
    pub fn enqueue(
        &self,
        op: WriteOp,
        key: &OrderingKey,
        priority: Priority,
        label: &'static str,
    ) -> Result<u64> {
        let shared = &self.inner.shared;
        if let Some(err) = shared.halted_error(key) {
            return Err(err.into());
        }
        if shared.closed.load(Ordering::Acquire) {
            return Err(DispatchError::Closed.into());
        }

        let mut next_seq = self.inner.next_seq.lock().unwrap();
        let seq = *next_seq;
        shared.add_pending(key);
        let job = Job {
            key: key.clone(),
            seq,
            priority,
            label,
            op,
        };
        if self.inner.commands.send(Command::Enqueue(job)).is_err() {
            shared.finish_pending(key, 1);
            return Err(DispatchError::Closed.into());
        }
        *next_seq += 1;
        trace!(%key, seq, label, "Enqueued write");
        Ok(seq)
    }

    /// Waits until every write enqueued so far for `key` has completed.
    pub async fn drain(&self, key: &OrderingKey) -> Result<()> {
        self.wait(Some(key.clone())).await
    }

    /// Waits until every write enqueued so far, on any key, has completed.
    pub async fn flush(&self) -> Result<()> {
        self.wait(None).await
    }

    async fn wait(&self, key: Option<OrderingKey>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let sent = self.inner.commands.send(Command::Drain {
            key: key.clone(),
            respond: tx,
        });
        let answer = match sent {
            Ok(()) => rx.await.ok(),
            Err(_) => None,
        };
        match answer {
            Some(result) => result.map_err(Into::into),
            // The background task already exited, so nothing is pending.
            None => match key.and_then(|k| self.inner.shared.halted_error(&k)) {
                Some(err) => Err(err.into()),
                None => Ok(()),
            },
        }
    }

    /// Finishes every queued write, then stops the background task.
    ///
    /// Later calls to [`enqueue`](Self::enqueue) fail with
    /// [`DispatchError::Closed`]. Calling this more than once is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        self.inner.shared.closed.store(true, Ordering::Release);
        let (tx, rx) = oneshot::channel();
        if self
            .inner
            .commands
            .send(Command::Shutdown { respond: tx })
            .is_ok()
        {
            let _ = rx.await;
        }
        Ok(())
    }

    /// Returns true once [`shutdown`](Self::shutdown) was called.
    pub fn is_closed(&self) -> bool {
        self.inner.shared.closed.load(Ordering::Acquire)
    }

    /// Number of writes for `key` enqueued but not yet completed.
    pub fn pending(&self, key: &OrderingKey) -> usize {
        self.inner
            .shared
            .pending
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// The failure that halted `key`, if any.
    pub fn halted(&self, key: &OrderingKey) -> Option<Arc<MirrorWriteError>> {
        self.inner.shared.halted_cause(key)
    }

    /// The recent-results feed.
    pub fn results(&self) -> &ResultFeed {
        &self.inner.shared.results
    }

    /// Copies the most recent successful writes, oldest first.
    pub fn recent_results(&self) -> Vec<WriteReport> {
        self.inner.shared.results.recent()
    }

    /// Removes and returns the most recent successful writes.
    pub fn take_results(&self) -> Vec<WriteReport> {
        self.inner.shared.results.take()
    }
}

impl fmt::Debug for WriteDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteDispatcher")
            .field("closed", &self.is_closed())
            .field("results", &self.inner.shared.results.len())
            .finish()
    }
}
