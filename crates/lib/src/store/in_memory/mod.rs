//! In-memory document store implementation
//!
//! This module provides an in-memory implementation of the [`DocumentStore`]
//! trait, suitable for testing, development, or single-process deployments
//! where persistence is handled by saving the whole state to a file.

mod persistence;
mod storage;

use std::any::Any;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{DocumentStore, Filter, PushEach, StoreResult, WriteOutcome};
use crate::{Result, constants::DEFAULT_OP_LOG_CAPACITY};

/// One operation applied by an [`InMemory`] store, recorded in its log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOp {
    /// Operation name, e.g. `"set_field"` or `"push_each"`
    pub kind: &'static str,
    /// Path the operation addressed; multi-field sets join their paths with `,`
    pub path: String,
}

/// A simple in-memory document store.
///
/// Documents are kept as JSON values in insertion order. Update semantics
/// follow the usual document database conventions (upserts seed the document
/// from the filter, `$push` style slices, positional array paths).
///
/// Reads and writes can be slowed down with [`with_latency`](Self::with_latency)
/// and [`with_jitter`](Self::with_jitter) to exercise the background writer
/// the way a remote service would.
///
/// The most recent operations are kept in a bounded log for inspection,
/// see [`with_op_log_capacity`](Self::with_op_log_capacity).
#[derive(Debug)]
pub struct InMemory {
    /// Document storage with read-write lock for concurrent access
    pub(crate) documents: RwLock<Vec<Value>>,
    /// The most recent reads and writes, in application order
    pub(crate) op_log: Mutex<VecDeque<StoreOp>>,
    op_log_capacity: usize,
    latency: Duration,
    jitter: Duration,
}

impl Default for InMemory {
    fn default() -> Self {
        Self {
            documents: RwLock::default(),
            op_log: Mutex::default(),
            op_log_capacity: DEFAULT_OP_LOG_CAPACITY,
            latency: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }
}

impl InMemory {
    /// Creates a new, empty `InMemory` store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `documents`.
    pub fn with_documents(documents: Vec<Value>) -> Self {
        Self {
            documents: RwLock::new(documents),
            ..Self::default()
        }
    }

    /// Keeps at most `capacity` operations in the log, dropping the oldest.
    /// A capacity of zero turns the log off.
    pub fn with_op_log_capacity(mut self, capacity: usize) -> Self {
        self.op_log_capacity = capacity;
        self.op_log.get_mut().unwrap().truncate(capacity);
        self
    }

    /// Adds a fixed delay before every operation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Adds a random extra delay of up to `jitter` before every operation.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns a copy of every stored document.
    pub async fn documents(&self) -> Vec<Value> {
        self.documents.read().await.clone()
    }

    /// Returns a copy of the first document matching `filter`.
    pub async fn document(&self, filter: &Filter) -> Option<Value> {
        let documents = self.documents.read().await;
        documents.iter().find(|doc| filter.matches(doc)).cloned()
    }

    /// Returns the most recent operations, oldest first.
    pub fn op_log(&self) -> Vec<StoreOp> {
        self.op_log.lock().unwrap().iter().cloned().collect()
    }

    /// Clears the operation log.
    pub fn clear_op_log(&self) {
        self.op_log.lock().unwrap().clear();
    }

    /// Saves every document to a file as JSON.
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persistence::save_to_file(self, path).await
    }

    /// Loads a store from a JSON file written by [`save_to_file`](Self::save_to_file).
    ///
    /// If the file does not exist, a new, empty store is returned.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        persistence::load_from_file(path).await
    }

    fn record(&self, kind: &'static str, path: impl Into<String>) {
        if self.op_log_capacity == 0 {
            return;
        }
        let mut log = self.op_log.lock().unwrap();
        if log.len() == self.op_log_capacity {
            log.pop_front();
        }
        log.push_back(StoreOp {
            kind,
            path: path.into(),
        });
    }

    async fn simulate_latency(&self) {
        let mut delay = self.latency;
        if !self.jitter.is_zero() {
            let max = self.jitter.as_micros() as u64;
            delay += Duration::from_micros(rand::thread_rng().gen_range(0..=max));
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DocumentStore for InMemory {
    async fn find_one(&self, filter: &Filter, path: &str) -> StoreResult<Option<Value>> {
        self.simulate_latency().await;
        self.record("find_one", path);
        Ok(storage::find_one(self, filter, path).await)
    }

    async fn find_one_and_create_if_absent(
        &self,
        filter: &Filter,
        initial: Value,
        path: &str,
    ) -> StoreResult<Value> {
        self.simulate_latency().await;
        self.record("find_one_and_create_if_absent", path);
        storage::find_one_and_create_if_absent(self, filter, initial, path).await
    }

    async fn set_field(
        &self,
        filter: &Filter,
        path: &str,
        value: Value,
        upsert: bool,
    ) -> StoreResult<WriteOutcome> {
        self.simulate_latency().await;
        self.record("set_field", path);
        storage::set_field(self, filter, path, value, upsert).await
    }

    async fn unset_field(&self, filter: &Filter, path: &str) -> StoreResult<WriteOutcome> {
        self.simulate_latency().await;
        self.record("unset_field", path);
        storage::unset_field(self, filter, path).await
    }

    async fn push_each(
        &self,
        filter: &Filter,
        path: &str,
        push: PushEach,
        upsert: bool,
    ) -> StoreResult<WriteOutcome> {
        self.simulate_latency().await;
        self.record("push_each", path);
        storage::push_each(self, filter, path, push, upsert).await
    }

    async fn pop_one_end(
        &self,
        filter: &Filter,
        path: &str,
        from_end: bool,
    ) -> StoreResult<WriteOutcome> {
        self.simulate_latency().await;
        self.record("pop_one_end", path);
        storage::pop_one_end(self, filter, path, from_end).await
    }

    async fn pull_equal(
        &self,
        filter: &Filter,
        path: &str,
        value: &Value,
    ) -> StoreResult<WriteOutcome> {
        self.simulate_latency().await;
        self.record("pull_equal", path);
        storage::pull_equal(self, filter, path, value).await
    }

    async fn reverse_array_field(&self, filter: &Filter, path: &str) -> StoreResult<Option<Value>> {
        self.simulate_latency().await;
        self.record("reverse_array_field", path);
        storage::reverse_array_field(self, filter, path).await
    }

    async fn set_multiple_fields(
        &self,
        filter: &Filter,
        fields: Vec<(String, Value)>,
        upsert: bool,
    ) -> StoreResult<WriteOutcome> {
        self.simulate_latency().await;
        let paths = fields
            .iter()
            .map(|(path, _)| path.as_str())
            .collect::<Vec<_>>()
            .join(",");
        self.record("set_multiple_fields", paths);
        storage::set_multiple_fields(self, filter, fields, upsert).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
