//! Document store abstraction.
//!
//! This module defines the [`DocumentStore`] trait, the narrow contract the
//! mirroring engine consumes from a remote document service, plus the
//! [`InMemory`] implementation used for tests, demos and single-process
//! deployments.
//!
//! Every operation addresses one document through a [`Filter`] and a value
//! inside it through a dot-delimited path (see [`path`]). Write operations
//! report a [`WriteOutcome`] modelled on the update results of common
//! document databases.

use std::{any::Any, fmt};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

mod errors;
mod in_memory;
pub mod path;

pub use errors::StoreError;
pub use in_memory::{InMemory, StoreOp};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Equality filter selecting one document, e.g. `{"id": "x"}`.
///
/// Keys may be dot-delimited paths; a document matches when every key
/// resolves to an equal value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Map<String, Value>);

impl Filter {
    /// Creates an empty filter, which matches any document.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Adds an equality condition.
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns true if `document` satisfies every condition.
    pub fn matches(&self, document: &Value) -> bool {
        self.0
            .iter()
            .all(|(key, expected)| path::lookup(document, key) == Some(expected))
    }

    /// Returns true if the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builds the skeleton of a document created by an upsert through this
    /// filter: every condition becomes a field.
    pub fn seed_document(&self) -> StoreResult<Value> {
        let mut document = Value::Object(Map::new());
        for (key, value) in &self.0 {
            path::assign(&mut document, key, value.clone())?;
        }
        Ok(document)
    }
}

impl From<Map<String, Value>> for Filter {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

/// Result of a single write operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    /// Number of documents matched by the filter (0 or 1)
    pub matched: u64,
    /// Number of documents whose contents changed
    pub modified: u64,
    /// Whether the document was created by this write
    pub upserted: bool,
}

impl WriteOutcome {
    /// Outcome for a write whose filter matched nothing.
    pub fn unmatched() -> Self {
        Self::default()
    }

    /// Outcome for a write against an existing document.
    pub fn matched(modified: bool) -> Self {
        Self {
            matched: 1,
            modified: u64::from(modified),
            upserted: false,
        }
    }

    /// Outcome for a write that created its document.
    pub fn upserted() -> Self {
        Self {
            matched: 0,
            modified: 1,
            upserted: true,
        }
    }
}

/// Arguments of a push-each operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushEach {
    /// Values appended in order
    pub values: Vec<Value>,
    /// Insert position; `None` appends at the end
    pub position: Option<usize>,
    /// Post-push trim: a positive bound keeps the first `n` elements, a
    /// negative bound keeps the last `n`
    pub slice: Option<i64>,
}

/// Document store trait consumed by the mirroring engine.
///
/// Implementations translate each call into one remote operation. All
/// implementations must be `Send` and `Sync` so a single handle can be shared
/// by every node of a tree and by the background writer, and implement `Any`
/// to allow downcasting to a concrete store.
#[async_trait]
pub trait DocumentStore: Send + Sync + Any {
    /// Returns the value at `path` in the first document matching `filter`,
    /// or `None` if the document or the path is absent.
    async fn find_one(&self, filter: &Filter, path: &str) -> StoreResult<Option<Value>>;

    /// Like [`find_one`](Self::find_one), but atomically creates the document
    /// and/or sets `initial` at `path` when absent, returning the value.
    async fn find_one_and_create_if_absent(
        &self,
        filter: &Filter,
        initial: Value,
        path: &str,
    ) -> StoreResult<Value>;

    /// Sets the field at `path`.
    async fn set_field(
        &self,
        filter: &Filter,
        path: &str,
        value: Value,
        upsert: bool,
    ) -> StoreResult<WriteOutcome>;

    /// Removes the field at `path`.
    async fn unset_field(&self, filter: &Filter, path: &str) -> StoreResult<WriteOutcome>;

    /// Pushes values into the array at `path`, creating it when missing.
    async fn push_each(
        &self,
        filter: &Filter,
        path: &str,
        push: PushEach,
        upsert: bool,
    ) -> StoreResult<WriteOutcome>;

    /// Removes the last (`from_end`) or first element of the array at `path`.
    async fn pop_one_end(
        &self,
        filter: &Filter,
        path: &str,
        from_end: bool,
    ) -> StoreResult<WriteOutcome>;

    /// Removes every element equal to `value` from the array at `path`.
    async fn pull_equal(&self, filter: &Filter, path: &str, value: &Value)
    -> StoreResult<WriteOutcome>;

    /// Computes the reversed array at `path` on the store side and returns it
    /// without modifying the document.
    async fn reverse_array_field(&self, filter: &Filter, path: &str) -> StoreResult<Option<Value>>;

    /// Sets several fields in one operation.
    async fn set_multiple_fields(
        &self,
        filter: &Filter,
        fields: Vec<(String, Value)>,
        upsert: bool,
    ) -> StoreResult<WriteOutcome>;

    /// Returns a reference to self as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}
