//! Mirrored containers.
//!
//! A mirror is a tree of in-memory containers, [`MirrorMap`] and
//! [`MirrorSeq`], rooted at a field of one stored document. Every mutating
//! call changes the local container at once and hands a single [`Patch`]
//! describing the change to the root's [`WriteDispatcher`], which applies it
//! to the store in the background:
//!
//! - reads always see the local state, never the store;
//! - each node knows the dot-delimited path it occupies in the document and
//!   the path is rewritten as the last local step of every structural change,
//!   so later calls never see a stale path;
//! - every node of a tree shares one ordering key, so the store observes the
//!   writes of the whole tree in issue order.
//!
//! Raw nested values (JSON arrays and objects) passed to a mutating call are
//! materialized into child nodes that mirror their own mutations.
//!
//! ```
//! # use std::sync::Arc;
//! # use serde_json::json;
//! # use mirrordoc::mirror::MirrorBuilder;
//! # use mirrordoc::store::{DocumentStore, Filter, InMemory};
//! # #[tokio::main]
//! # async fn main() -> mirrordoc::Result<()> {
//! let store = Arc::new(InMemory::new());
//! let filter = Filter::new().eq("array_id", "example");
//!
//! let arr = MirrorBuilder::new()
//!     .store(store.clone())
//!     .filter(filter.clone())
//!     .path("inner.arr")
//!     .initial(json!([1, 2, [6, 7, 8]]))
//!     .capacity(10)
//!     .open_seq()
//!     .await?;
//!
//! arr.append(9)?;
//! arr.pop_left()?;
//! let nested = arr.get(1).and_then(|item| item.as_seq().cloned()).unwrap();
//! nested.extend([json!("a"), json!("b")])?;
//!
//! arr.drain().await?;
//! let stored = store.find_one(&filter, "inner.arr").await?;
//! assert_eq!(stored, Some(json!([2, [6, 7, 8, "a", "b"], 9])));
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    Result,
    dispatch::{DispatchError, OrderingKey, Priority, WriteDispatcher},
    store::{DocumentStore, Filter},
};

mod builder;
mod errors;
mod hydrate;
mod map;
mod patch;
mod seq;
mod slice;

pub use builder::MirrorBuilder;
pub use errors::MirrorError;
pub use map::MirrorMap;
pub use patch::Patch;
pub use seq::MirrorSeq;
pub use slice::Slice;

type Transform = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Leaf value transforms inherited by every node of a tree.
///
/// `encode` runs on every leaf written to the store, `decode` on every leaf
/// loaded from it. The default is the identity.
#[derive(Clone)]
pub struct Codec {
    encode: Transform,
    decode: Transform,
}

impl Codec {
    /// Creates a codec from a pair of leaf transforms.
    pub fn new(
        encode: impl Fn(&Value) -> Value + Send + Sync + 'static,
        decode: impl Fn(&Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }

    /// Codec that stores leaves unchanged.
    pub fn identity() -> Self {
        Self::new(|leaf: &Value| leaf.clone(), |leaf: &Value| leaf.clone())
    }

    /// Transforms a local leaf into its stored form.
    pub fn encode(&self, leaf: &Value) -> Value {
        (self.encode)(leaf)
    }

    /// Transforms a stored leaf into its local form.
    pub fn decode(&self, leaf: &Value) -> Value {
        (self.decode)(leaf)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Codec")
    }
}

/// An element of a mirrored container.
///
/// `Map` and `Seq` hold live child nodes; mutating them is mirrored like
/// mutating the root. Passing a node handle into another mutating call copies
/// its current contents into a fresh child.
#[derive(Debug, Clone)]
pub enum Item {
    /// A leaf, or a raw nested value not yet materialized
    Value(Value),
    /// A nested map node
    Map(MirrorMap),
    /// A nested sequence node
    Seq(MirrorSeq),
}

impl Item {
    /// The leaf value, if this is not a node.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Item::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The map node, if this is one.
    pub fn as_map(&self) -> Option<&MirrorMap> {
        match self {
            Item::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The sequence node, if this is one.
    pub fn as_seq(&self) -> Option<&MirrorSeq> {
        match self {
            Item::Seq(seq) => Some(seq),
            _ => None,
        }
    }

    /// Returns true for child nodes.
    pub fn is_node(&self) -> bool {
        !matches!(self, Item::Value(_))
    }

    /// Path of the node, if this is one.
    pub fn path(&self) -> Option<String> {
        match self {
            Item::Value(_) => None,
            Item::Map(map) => Some(map.path()),
            Item::Seq(seq) => Some(seq.path()),
        }
    }

    /// Flattens the item into a plain value with local leaves.
    pub fn snapshot(&self) -> Value {
        match self {
            Item::Value(value) => value.clone(),
            Item::Map(map) => map.snapshot(),
            Item::Seq(seq) => seq.snapshot(),
        }
    }

    pub(crate) fn rebase(&self, path: String) {
        match self {
            Item::Value(_) => {}
            Item::Map(map) => map.rebase(path),
            Item::Seq(seq) => seq.rebase(path),
        }
    }

    pub(crate) fn detach(&self) {
        match self {
            Item::Value(_) => {}
            Item::Map(map) => map.detach(),
            Item::Seq(seq) => seq.detach(),
        }
    }
}

impl PartialEq<Value> for Item {
    fn eq(&self, other: &Value) -> bool {
        match self {
            Item::Value(value) => value == other,
            node => node.snapshot() == *other,
        }
    }
}

impl From<Value> for Item {
    fn from(value: Value) -> Self {
        Item::Value(value)
    }
}

impl From<&Value> for Item {
    fn from(value: &Value) -> Self {
        Item::Value(value.clone())
    }
}

impl From<MirrorMap> for Item {
    fn from(map: MirrorMap) -> Self {
        Item::Map(map)
    }
}

impl From<MirrorSeq> for Item {
    fn from(seq: MirrorSeq) -> Self {
        Item::Seq(seq)
    }
}

macro_rules! item_from_leaf {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Item {
                fn from(value: $ty) -> Self {
                    Item::Value(Value::from(value))
                }
            }
        )*
    };
}

item_from_leaf!(bool, i32, i64, u32, u64, f64, &str, String);

/// Container kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Map,
    Seq,
}

impl Kind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Kind::Map => "mapping",
            Kind::Seq => "array",
        }
    }

    pub(crate) fn empty(self) -> Value {
        match self {
            Kind::Map => Value::Object(Default::default()),
            Kind::Seq => Value::Array(Vec::new()),
        }
    }

    pub(crate) fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Kind::Map, Value::Object(_)) | (Kind::Seq, Value::Array(_))
        )
    }
}

/// Everything the nodes of one tree share.
pub(crate) struct Binding {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) filter: Filter,
    pub(crate) codec: Codec,
    pub(crate) dispatcher: WriteDispatcher,
    pub(crate) key: OrderingKey,
    pub(crate) priority: Priority,
    pub(crate) owns_dispatcher: bool,
    /// Held for the whole of each mutating call on any node of the tree, so
    /// local changes and enqueued writes happen in the same order.
    gate: Mutex<()>,
}

impl Binding {
    pub(crate) fn new(
        store: Arc<dyn DocumentStore>,
        filter: Filter,
        codec: Codec,
        dispatcher: WriteDispatcher,
        key: OrderingKey,
        priority: Priority,
        owns_dispatcher: bool,
    ) -> Self {
        Self {
            store,
            filter,
            codec,
            dispatcher,
            key,
            priority,
            owns_dispatcher,
            gate: Mutex::new(()),
        }
    }

    fn submit(&self, patch: Patch) -> Result<u64> {
        let label = patch.label();
        debug!(key = %self.key, label, "Mirroring mutation");
        let store = self.store.clone();
        let filter = self.filter.clone();
        self.dispatcher.enqueue(
            Box::pin(async move { patch.apply(store.as_ref(), &filter).await }),
            &self.key,
            self.priority,
            label,
        )
    }

    /// Fails when writes for this tree can no longer be enqueued.
    fn ensure_writable(&self) -> Result<()> {
        if let Some(cause) = self.dispatcher.halted(&self.key) {
            return Err(DispatchError::Halted {
                key: self.key.clone(),
                cause,
            }
            .into());
        }
        if self.dispatcher.is_closed() {
            return Err(DispatchError::Closed.into());
        }
        Ok(())
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("filter", &self.filter)
            .field("key", &self.key)
            .field("priority", &self.priority)
            .field("owns_dispatcher", &self.owns_dispatcher)
            .finish()
    }
}

/// State common to map and sequence nodes.
#[derive(Debug)]
pub(crate) struct NodeCore {
    binding: Arc<Binding>,
    path: Mutex<String>,
    attached: AtomicBool,
    root: bool,
}

impl NodeCore {
    pub(crate) fn root(binding: Arc<Binding>, path: String) -> Self {
        Self {
            binding,
            path: Mutex::new(path),
            attached: AtomicBool::new(true),
            root: true,
        }
    }

    pub(crate) fn child(binding: Arc<Binding>, path: String) -> Self {
        Self {
            root: false,
            ..Self::root(binding, path)
        }
    }

    pub(crate) fn binding(&self) -> &Arc<Binding> {
        &self.binding
    }

    pub(crate) fn path(&self) -> String {
        self.path.lock().unwrap().clone()
    }

    /// Replaces the path; returns false when it was already `path`.
    pub(crate) fn set_path(&self, path: &str) -> bool {
        let mut current = self.path.lock().unwrap();
        if *current == path {
            return false;
        }
        *current = path.to_string();
        true
    }

    pub(crate) fn is_root(&self) -> bool {
        self.root
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Marks the node as removed from its tree; returns false when it
    /// already was.
    pub(crate) fn detach(&self) -> bool {
        self.attached.swap(false, Ordering::AcqRel)
    }

    /// Starts a mutating call: takes the tree gate and checks that the
    /// resulting write can be enqueued. A call rejected here leaves the
    /// local contents untouched.
    pub(crate) fn begin(&self) -> Result<MutexGuard<'_, ()>> {
        let gate = self.binding.gate.lock().unwrap();
        if self.is_attached() {
            self.binding.ensure_writable()?;
        }
        Ok(gate)
    }

    /// Enqueues the patch for an attached node; detached nodes only change
    /// locally.
    ///
    /// The mutation passed [`begin`](Self::begin), so its local change
    /// stands. When the lane halts or the dispatcher closes in between, the
    /// write is abandoned like the writes still queued at that moment and
    /// the next call on the tree reports why.
    pub(crate) fn submit(&self, patch: Patch) -> Result<()> {
        if !self.is_attached() {
            return Ok(());
        }
        match self.binding.submit(patch) {
            Ok(_) => Ok(()),
            Err(err) if err.is_write_failure() || err.is_closed() => {
                warn!(
                    key = %self.binding.key,
                    error = %err,
                    "Abandoning write of an accepted mutation"
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub(crate) async fn drain(&self) -> Result<()> {
        self.binding.dispatcher.drain(&self.binding.key).await
    }

    pub(crate) async fn shutdown(&self) -> Result<()> {
        if self.binding.owns_dispatcher {
            self.binding.dispatcher.shutdown().await
        } else {
            self.drain().await
        }
    }
}
