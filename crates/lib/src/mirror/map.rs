//! Mirrored key/value node.

use std::fmt;
use std::sync::{Arc, Mutex};

use handle_trait::Handle;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::{
    Binding, Item, MirrorError, NodeCore, Patch,
    hydrate::{self, Leaves},
};
use crate::{
    Result,
    dispatch::{OrderingKey, WriteDispatcher},
    store::{Filter, path},
};

pub(crate) struct MapInner {
    core: NodeCore,
    entries: Mutex<IndexMap<String, Item>>,
}

/// A key/value container mirrored to a field of a stored document.
///
/// Keys keep insertion order. Values are leaves or child nodes; raw JSON
/// objects and arrays are materialized into children on insertion. Every
/// mutation is applied locally before the call returns and written to the
/// store in the background as a single update.
#[derive(Clone, Handle)]
pub struct MirrorMap {
    inner: Arc<MapInner>,
}

impl MirrorMap {
    pub(crate) fn root(binding: Arc<Binding>, path: String, entries: Vec<(String, Item)>) -> Self {
        Self::with_core(NodeCore::root(binding, path), entries)
    }

    pub(crate) fn child(binding: Arc<Binding>, path: String, entries: Vec<(String, Item)>) -> Self {
        Self::with_core(NodeCore::child(binding, path), entries)
    }

    fn with_core(core: NodeCore, entries: Vec<(String, Item)>) -> Self {
        Self {
            inner: Arc::new(MapInner {
                core,
                entries: Mutex::new(entries.into_iter().collect()),
            }),
        }
    }

    fn binding(&self) -> &Arc<Binding> {
        self.inner.core.binding()
    }

    /// Dot-delimited path of this map inside the document.
    pub fn path(&self) -> String {
        self.inner.core.path()
    }

    /// Returns true for the root of a tree.
    pub fn is_root(&self) -> bool {
        self.inner.core.is_root()
    }

    /// Returns false once this node was removed from its tree; detached
    /// nodes keep working locally but no longer write to the store.
    pub fn is_attached(&self) -> bool {
        self.inner.core.is_attached()
    }

    /// Filter selecting the backing document.
    pub fn filter(&self) -> &Filter {
        &self.binding().filter
    }

    /// Ordering key shared by every node of this tree.
    pub fn ordering_key(&self) -> &OrderingKey {
        &self.binding().key
    }

    /// The dispatcher writing this tree's updates.
    pub fn dispatcher(&self) -> &WriteDispatcher {
        &self.binding().dispatcher
    }

    /// Number of entries held locally.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().unwrap().len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.entries.lock().unwrap().contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.lock().unwrap().keys().cloned().collect()
    }

    /// The item under `key`. Child nodes are returned as live handles.
    pub fn get(&self, key: &str) -> Option<Item> {
        self.inner.entries.lock().unwrap().get(key).cloned()
    }

    /// Plain copy of the value under `key`.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.get(key).map(|item| item.snapshot())
    }

    /// Flattens the map into a plain JSON object with local leaves.
    pub fn snapshot(&self) -> Value {
        let entries = self.inner.entries.lock().unwrap();
        let fields: Map<String, Value> = entries
            .iter()
            .map(|(key, item)| (key.clone(), item.snapshot()))
            .collect();
        Value::Object(fields)
    }

    /// Flattens the map into the form written to the store.
    pub fn dehydrate(&self) -> Value {
        let binding = self.binding();
        let entries = self.inner.entries.lock().unwrap();
        let fields: Map<String, Value> = entries
            .iter()
            .map(|(key, item)| (key.clone(), hydrate::dehydrate(item, binding)))
            .collect();
        Value::Object(fields)
    }

    /// Sets `key` to `value`.
    ///
    /// Raw objects and arrays become child nodes and are written as one
    /// nested subtree; leaves are encoded and written as one field.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Item>) -> Result<()> {
        let key = key.into();
        path::validate_component(&key).map_err(MirrorError::from)?;

        let core = &self.inner.core;
        let _gate = core.begin()?;
        let field = path::join(&core.path(), &key);
        let item = hydrate::materialize(self.binding(), field.clone(), value.into(), Leaves::Local)?;
        let stored = hydrate::dehydrate(&item, self.binding());

        if let Some(old) = self.inner.entries.lock().unwrap().insert(key, item) {
            old.detach();
        }
        core.submit(Patch::Set {
            path: field,
            value: stored,
            upsert: true,
        })
    }

    /// Removes `key`.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.pop(key).map(|_| ())
    }

    /// Removes `key` and returns a plain copy of its value.
    pub fn pop(&self, key: &str) -> Result<Value> {
        let core = &self.inner.core;
        let _gate = core.begin()?;
        let base = core.path();
        let removed = self.inner.entries.lock().unwrap().shift_remove(key);
        let Some(item) = removed else {
            return Err(MirrorError::KeyNotFound {
                path: base,
                key: key.to_string(),
            }
            .into());
        };

        item.detach();
        core.submit(Patch::Unset {
            path: path::join(&base, key),
        })?;
        Ok(item.snapshot())
    }

    /// Removes and returns the most recently inserted entry.
    pub fn pop_item(&self) -> Result<(String, Value)> {
        let core = &self.inner.core;
        let _gate = core.begin()?;
        let base = core.path();
        let removed = self.inner.entries.lock().unwrap().pop();
        let Some((key, item)) = removed else {
            return Err(MirrorError::EmptyMap { path: base }.into());
        };

        item.detach();
        core.submit(Patch::Unset {
            path: path::join(&base, &key),
        })?;
        Ok((key, item.snapshot()))
    }

    /// Removes every entry, resetting the stored field to an empty mapping.
    pub fn clear(&self) -> Result<()> {
        let core = &self.inner.core;
        let _gate = core.begin()?;
        for (_, item) in self.inner.entries.lock().unwrap().drain(..) {
            item.detach();
        }
        core.submit(Patch::Set {
            path: core.path(),
            value: Value::Object(Map::new()),
            upsert: true,
        })
    }

    /// Sets several keys as one store update.
    pub fn update<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: Into<String>,
        V: Into<Item>,
    {
        let pairs: Vec<(String, Item)> = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        for (key, _) in &pairs {
            path::validate_component(key).map_err(MirrorError::from)?;
        }
        if pairs.is_empty() {
            return Ok(());
        }

        let core = &self.inner.core;
        let _gate = core.begin()?;
        let base = core.path();
        let mut materialized = Vec::with_capacity(pairs.len());
        let mut fields = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let field = path::join(&base, &key);
            let item = hydrate::materialize(self.binding(), field.clone(), value, Leaves::Local)?;
            fields.push((field, hydrate::dehydrate(&item, self.binding())));
            materialized.push((key, item));
        }

        {
            let mut entries = self.inner.entries.lock().unwrap();
            for (key, item) in materialized {
                if let Some(old) = entries.insert(key, item) {
                    old.detach();
                }
            }
        }
        core.submit(Patch::SetMany {
            fields,
            upsert: true,
        })
    }

    /// Waits until every write issued so far on this tree is applied.
    pub async fn drain(&self) -> Result<()> {
        self.inner.core.drain().await
    }

    /// Drains this tree and stops its dispatcher if the tree owns it.
    pub async fn shutdown(&self) -> Result<()> {
        self.inner.core.shutdown().await
    }

    pub(crate) fn rebase(&self, path: String) {
        if !self.inner.core.set_path(&path) {
            return;
        }
        for (key, item) in self.inner.entries.lock().unwrap().iter() {
            item.rebase(path::join(&path, key));
        }
    }

    pub(crate) fn detach(&self) {
        if !self.inner.core.detach() {
            return;
        }
        for item in self.inner.entries.lock().unwrap().values() {
            item.detach();
        }
    }
}

impl PartialEq<Value> for MirrorMap {
    fn eq(&self, other: &Value) -> bool {
        self.snapshot() == *other
    }
}

impl fmt::Debug for MirrorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorMap")
            .field("path", &self.path())
            .field("attached", &self.is_attached())
            .field("entries", &self.snapshot())
            .finish()
    }
}
