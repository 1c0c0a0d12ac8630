//! The dispatcher's background task.
//!
//! All scheduling state lives on this task. Handles talk to it through an
//! unbounded command channel; running writes report back through a second
//! channel so the task never awaits a write directly.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use super::{
    DispatchError, DispatcherOptions, FailureAction, MirrorWriteError, OrderingKey, Priority,
    SharedState, WriteObserver, WriteOp, WriteReport,
};
use crate::{
    Clock,
    store::{StoreError, StoreResult, WriteOutcome},
};

pub(super) enum Command {
    Enqueue(Job),
    Drain {
        key: Option<OrderingKey>,
        respond: oneshot::Sender<Result<(), DispatchError>>,
    },
    Shutdown {
        respond: oneshot::Sender<()>,
    },
}

pub(super) struct Job {
    pub(super) key: OrderingKey,
    pub(super) seq: u64,
    pub(super) priority: Priority,
    pub(super) label: &'static str,
    pub(super) op: WriteOp,
}

struct Completion {
    key: OrderingKey,
    seq: u64,
    label: &'static str,
    result: StoreResult<WriteOutcome>,
}

struct Waiter {
    target: u64,
    respond: oneshot::Sender<Result<(), DispatchError>>,
}

struct FlushWaiter {
    targets: Vec<(OrderingKey, u64)>,
    respond: oneshot::Sender<Result<(), DispatchError>>,
}

/// Per-key queue. `enqueued` and `completed` count jobs seen and jobs
/// finished (or discarded), so a drain waits for `completed >= enqueued`
/// as of the moment it was requested.
#[derive(Default)]
struct Lane {
    queue: VecDeque<Job>,
    running: bool,
    enqueued: u64,
    completed: u64,
    waiters: Vec<Waiter>,
    halted: Option<Arc<MirrorWriteError>>,
}

impl Lane {
    fn is_quiet(&self) -> bool {
        !self.running
            && self.queue.is_empty()
            && self.waiters.is_empty()
            && self.halted.is_none()
            && self.completed == self.enqueued
    }
}

/// A lane whose head job may start. Max-heap order: higher priority first,
/// then the older head.
#[derive(PartialEq, Eq)]
struct ReadyLane {
    priority: Priority,
    seq: u64,
    key: OrderingKey,
}

impl Ord for ReadyLane {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ReadyLane {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub(super) struct Scheduler {
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    shared: Arc<SharedState>,
    observer: Option<Arc<dyn WriteObserver>>,
    clock: Arc<dyn Clock>,
    max_in_flight: usize,
    in_flight: usize,
    lanes: HashMap<OrderingKey, Lane>,
    ready: BinaryHeap<ReadyLane>,
    flush_waiters: Vec<FlushWaiter>,
    shutdown_waiters: Vec<oneshot::Sender<()>>,
    closing: bool,
    commands_closed: bool,
}

impl Scheduler {
    pub(super) fn new(
        commands: mpsc::UnboundedReceiver<Command>,
        shared: Arc<SharedState>,
        options: &DispatcherOptions,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            commands,
            completions_tx,
            completions_rx,
            shared,
            observer: options.observer.clone(),
            clock: options.clock.clone(),
            max_in_flight: options.max_in_flight,
            in_flight: 0,
            lanes: HashMap::new(),
            ready: BinaryHeap::new(),
            flush_waiters: Vec::new(),
            shutdown_waiters: Vec::new(),
            closing: false,
            commands_closed: false,
        }
    }

    pub(super) async fn run(mut self) {
        let span = info_span!("write_dispatcher", max_in_flight = self.max_in_flight);
        async move {
            debug!("Write dispatcher started");
            loop {
                self.dispatch_ready();

                if self.closing && self.is_idle() {
                    // Pick up anything sent just before the close.
                    let mut absorbed = false;
                    while let Ok(command) = self.commands.try_recv() {
                        self.handle_command(command);
                        absorbed = true;
                    }
                    if !absorbed {
                        break;
                    }
                    continue;
                }

                tokio::select! {
                    Some(completion) = self.completions_rx.recv() => {
                        self.complete(completion);
                    }
                    command = self.commands.recv(), if !self.commands_closed => {
                        match command {
                            Some(command) => self.handle_command(command),
                            None => {
                                debug!("All dispatcher handles dropped");
                                self.commands_closed = true;
                                self.closing = true;
                            }
                        }
                    }
                    else => break,
                }
            }

            for respond in self.shutdown_waiters.drain(..) {
                let _ = respond.send(());
            }
            info!("Write dispatcher stopped");
        }
        .instrument(span)
        .await
    }

    fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.lanes.values().all(|lane| lane.queue.is_empty())
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Enqueue(job) => self.accept(job),
            Command::Drain {
                key: Some(key),
                respond,
            } => self.drain_key(key, respond),
            Command::Drain { key: None, respond } => self.flush(respond),
            Command::Shutdown { respond } => {
                debug!("Shutdown requested");
                self.closing = true;
                self.shutdown_waiters.push(respond);
            }
        }
    }

    fn accept(&mut self, job: Job) {
        let lane = self.lanes.entry(job.key.clone()).or_default();
        lane.enqueued += 1;

        if lane.halted.is_some() {
            lane.completed += 1;
            self.shared.finish_pending(&job.key, 1);
            debug!(key = %job.key, seq = job.seq, "Discarded write on halted key");
            return;
        }

        if !lane.running && lane.queue.is_empty() {
            self.ready.push(ReadyLane {
                priority: job.priority,
                seq: job.seq,
                key: job.key.clone(),
            });
        }
        lane.queue.push_back(job);
    }

    fn drain_key(&mut self, key: OrderingKey, respond: oneshot::Sender<Result<(), DispatchError>>) {
        let Some(lane) = self.lanes.get_mut(&key) else {
            let _ = respond.send(Ok(()));
            return;
        };
        if let Some(cause) = &lane.halted {
            let _ = respond.send(Err(DispatchError::Halted {
                key,
                cause: cause.clone(),
            }));
        } else if lane.completed >= lane.enqueued {
            let _ = respond.send(Ok(()));
        } else {
            lane.waiters.push(Waiter {
                target: lane.enqueued,
                respond,
            });
        }
    }

    fn flush(&mut self, respond: oneshot::Sender<Result<(), DispatchError>>) {
        let targets: Vec<(OrderingKey, u64)> = self
            .lanes
            .iter()
            .filter(|(_, lane)| lane.completed < lane.enqueued)
            .map(|(key, lane)| (key.clone(), lane.enqueued))
            .collect();
        if targets.is_empty() {
            let _ = respond.send(Ok(()));
        } else {
            self.flush_waiters.push(FlushWaiter { targets, respond });
        }
    }

    fn dispatch_ready(&mut self) {
        while self.max_in_flight == 0 || self.in_flight < self.max_in_flight {
            let Some(ready) = self.ready.pop() else {
                break;
            };
            let Some(lane) = self.lanes.get_mut(&ready.key) else {
                continue;
            };
            if lane.running {
                continue;
            }
            let Some(job) = lane.queue.pop_front() else {
                continue;
            };
            lane.running = true;
            self.in_flight += 1;
            self.launch(job);
        }
    }

    fn launch(&self, job: Job) {
        let Job {
            key,
            seq,
            label,
            op,
            ..
        } = job;
        trace!(%key, seq, label, "Starting write");

        let completions = self.completions_tx.clone();
        tokio::spawn(
            async move {
                // Run the write on its own task so a panic surfaces as a
                // failed write instead of taking the dispatcher down.
                let result = match tokio::spawn(op).await {
                    Ok(result) => result,
                    Err(err) => Err(StoreError::Aborted {
                        reason: err.to_string(),
                    }),
                };
                let _ = completions.send(Completion {
                    key,
                    seq,
                    label,
                    result,
                });
            }
            .in_current_span(),
        );
    }

    fn complete(&mut self, completion: Completion) {
        let Completion {
            key,
            seq,
            label,
            result,
        } = completion;

        self.in_flight = self.in_flight.saturating_sub(1);
        if let Some(lane) = self.lanes.get_mut(&key) {
            lane.running = false;
            lane.completed += 1;
        }
        self.shared.finish_pending(&key, 1);

        match result {
            Ok(outcome) => {
                let report = WriteReport {
                    key: key.clone(),
                    seq,
                    label,
                    outcome,
                    completed_at: self.clock.now_millis(),
                };
                trace!(%key, seq, label, "Write completed");
                if let Some(observer) = &self.observer {
                    observer.on_success(&report);
                }
                self.shared.results.push(report);
            }
            Err(source) => {
                let err = MirrorWriteError {
                    key: key.clone(),
                    seq,
                    label,
                    source,
                };
                let action = match &self.observer {
                    Some(observer) => observer.on_failure(&err),
                    None => {
                        error!(%key, seq, label, "Unobserved write failure: {}", err.source);
                        FailureAction::Halt
                    }
                };
                if action == FailureAction::Halt {
                    self.halt(&key, Arc::new(err));
                }
            }
        }

        self.settle(&key);
    }

    fn halt(&mut self, key: &OrderingKey, cause: Arc<MirrorWriteError>) {
        let Some(lane) = self.lanes.get_mut(key) else {
            return;
        };
        let abandoned = lane.queue.len();
        lane.queue.clear();
        lane.completed += abandoned as u64;
        self.shared.finish_pending(key, abandoned);
        warn!(%key, abandoned, "Halting writes after failure");

        self.shared.mark_halted(key, cause.clone());
        for waiter in lane.waiters.drain(..) {
            let _ = waiter.respond.send(Err(DispatchError::Halted {
                key: key.clone(),
                cause: cause.clone(),
            }));
        }
        lane.halted = Some(cause);
    }

    fn settle(&mut self, key: &OrderingKey) {
        if let Some(lane) = self.lanes.get_mut(key) {
            if !lane.running && lane.halted.is_none() {
                if let Some(head) = lane.queue.front() {
                    self.ready.push(ReadyLane {
                        priority: head.priority,
                        seq: head.seq,
                        key: key.clone(),
                    });
                }
            }

            let completed = lane.completed;
            let (done, waiting): (Vec<_>, Vec<_>) = lane
                .waiters
                .drain(..)
                .partition(|waiter| waiter.target <= completed);
            lane.waiters = waiting;
            for waiter in done {
                let _ = waiter.respond.send(Ok(()));
            }
        }

        let lanes = &self.lanes;
        let (done, waiting): (Vec<_>, Vec<_>) =
            self.flush_waiters.drain(..).partition(|waiter| {
                waiter.targets.iter().all(|(key, target)| {
                    lanes.get(key).is_none_or(|lane| lane.completed >= *target)
                })
            });
        self.flush_waiters = waiting;
        for waiter in done {
            let _ = waiter.respond.send(Ok(()));
        }

        if self.lanes.get(key).is_some_and(Lane::is_quiet) {
            self.lanes.remove(key);
        }
    }
}
