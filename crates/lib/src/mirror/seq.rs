//! Mirrored double-ended sequence node.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use handle_trait::Handle;
use serde_json::Value;

use super::{
    Binding, Item, MirrorError, NodeCore, Patch, Slice,
    hydrate::{self, Leaves},
    patch,
};
use crate::{
    Result,
    dispatch::{OrderingKey, WriteDispatcher},
    store::{Filter, PushEach, path},
};

pub(crate) struct SeqInner {
    core: NodeCore,
    items: Mutex<VecDeque<Item>>,
    capacity: Option<usize>,
}

/// An ordered double-ended sequence mirrored to an array field of a stored
/// document.
///
/// Behaves like a deque with an optional maximum length: pushing onto a full
/// sequence drops elements from the opposite end, locally and in the store.
/// Only the root of a tree can be bounded.
///
/// Every structural change rewrites the paths of the child nodes that moved
/// before the call returns, so a handle taken from `get` always addresses
/// its current position.
#[derive(Clone, Handle)]
pub struct MirrorSeq {
    inner: Arc<SeqInner>,
}

/// Resolves a possibly negative index against `len`.
fn normalize(index: isize, len: usize) -> Option<usize> {
    let resolved = if index < 0 {
        index + len as isize
    } else {
        index
    };
    (0..len as isize)
        .contains(&resolved)
        .then_some(resolved as usize)
}

/// Drops elements from one end until the sequence fits.
fn trim(items: &mut VecDeque<Item>, capacity: Option<usize>, from_front: bool) {
    let Some(capacity) = capacity else {
        return;
    };
    while items.len() > capacity {
        let evicted = if from_front {
            items.pop_front()
        } else {
            items.pop_back()
        };
        if let Some(item) = evicted {
            item.detach();
        }
    }
}

/// Rewrites the path of every child node to match its position.
fn reindex(items: &VecDeque<Item>, base: &str) {
    for (index, item) in items.iter().enumerate() {
        item.rebase(path::join(base, index));
    }
}

impl MirrorSeq {
    pub(crate) fn root(
        binding: Arc<Binding>,
        path: String,
        items: Vec<Item>,
        capacity: Option<usize>,
    ) -> Self {
        Self::with_core(NodeCore::root(binding, path), items, capacity)
    }

    pub(crate) fn child(binding: Arc<Binding>, path: String, items: Vec<Item>) -> Self {
        Self::with_core(NodeCore::child(binding, path), items, None)
    }

    fn with_core(core: NodeCore, items: Vec<Item>, capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(SeqInner {
                core,
                items: Mutex::new(items.into()),
                capacity,
            }),
        }
    }

    fn binding(&self) -> &Arc<Binding> {
        self.inner.core.binding()
    }

    /// Dot-delimited path of this sequence inside the document.
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

    /// Maximum length, if bounded.
    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
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

    /// Number of elements held locally.
    pub fn len(&self) -> usize {
        self.inner.items.lock().unwrap().len()
    }

    /// True when there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The item at `index`; negative indices count from the end. Child nodes
    /// are returned as live handles.
    pub fn get(&self, index: isize) -> Option<Item> {
        let items = self.inner.items.lock().unwrap();
        normalize(index, items.len()).and_then(|i| items.get(i).cloned())
    }

    /// Plain copy of the value at `index`.
    pub fn get_value(&self, index: isize) -> Option<Value> {
        self.get(index).map(|item| item.snapshot())
    }

    /// Returns true if some element equals `value`.
    pub fn contains(&self, value: &Value) -> bool {
        self.inner
            .items
            .lock()
            .unwrap()
            .iter()
            .any(|item| item == value)
    }

    /// Every item, front to back.
    pub fn to_vec(&self) -> Vec<Item> {
        self.inner.items.lock().unwrap().iter().cloned().collect()
    }

    /// Flattens the sequence into a plain JSON array with local leaves.
    pub fn snapshot(&self) -> Value {
        let items = self.inner.items.lock().unwrap();
        Value::Array(items.iter().map(Item::snapshot).collect())
    }

    /// Flattens the sequence into the form written to the store.
    pub fn dehydrate(&self) -> Value {
        let binding = self.binding();
        let items = self.inner.items.lock().unwrap();
        Value::Array(
            items
                .iter()
                .map(|item| hydrate::dehydrate(item, binding))
                .collect(),
        )
    }

    /// Plain copies of the selected elements. Never mirrored.
    pub fn slice(&self, slice: Slice) -> Result<Vec<Value>> {
        let items = self.inner.items.lock().unwrap();
        let indices = slice.indices(items.len())?;
        Ok(indices.into_iter().map(|i| items[i].snapshot()).collect())
    }

    fn materialize_all(
        &self,
        base: &str,
        first: usize,
        values: Vec<Item>,
    ) -> Result<(Vec<Item>, Vec<Value>)> {
        let binding = self.binding();
        let mut items = Vec::with_capacity(values.len());
        let mut stored = Vec::with_capacity(values.len());
        for (offset, value) in values.into_iter().enumerate() {
            let item = hydrate::materialize(
                binding,
                path::join(base, first + offset),
                value,
                Leaves::Local,
            )?;
            stored.push(hydrate::dehydrate(&item, binding));
            items.push(item);
        }
        Ok((items, stored))
    }

    fn collect<I>(values: I) -> Vec<Item>
    where
        I: IntoIterator,
        I::Item: Into<Item>,
    {
        values.into_iter().map(Into::into).collect()
    }

    /// Appends to the back, dropping from the front when full.
    pub fn append(&self, value: impl Into<Item>) -> Result<()> {
        self.push_back(vec![value.into()])
    }

    /// Appends every value to the back, dropping from the front when full.
    pub fn extend<I>(&self, values: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Item>,
    {
        self.push_back(Self::collect(values))
    }

    /// Prepends to the front, dropping from the back when full.
    pub fn append_left(&self, value: impl Into<Item>) -> Result<()> {
        self.push_front(vec![value.into()])
    }

    /// Prepends every value in turn, so they end up in reverse order, dropping
    /// from the back when full.
    pub fn extend_left<I>(&self, values: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Item>,
    {
        self.push_front(Self::collect(values))
    }

    fn push_back(&self, values: Vec<Item>) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let core = &self.inner.core;
        let _gate = core.begin()?;
        let base = core.path();
        let (items, stored) = self.materialize_all(&base, self.len(), values)?;

        {
            let mut contents = self.inner.items.lock().unwrap();
            contents.extend(items);
            trim(&mut contents, self.inner.capacity, true);
            reindex(&contents, &base);
        }
        core.submit(Patch::Push {
            path: base,
            push: PushEach {
                values: stored,
                position: None,
                slice: self.inner.capacity.map(|capacity| -(capacity as i64)),
            },
            upsert: true,
        })
    }

    fn push_front(&self, values: Vec<Item>) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let core = &self.inner.core;
        let _gate = core.begin()?;
        let base = core.path();
        let (items, mut stored) = self.materialize_all(&base, 0, values)?;

        {
            let mut contents = self.inner.items.lock().unwrap();
            for item in items {
                contents.push_front(item);
            }
            trim(&mut contents, self.inner.capacity, false);
            reindex(&contents, &base);
        }
        stored.reverse();
        core.submit(Patch::Push {
            path: base,
            push: PushEach {
                values: stored,
                position: Some(0),
                slice: self.inner.capacity.map(|capacity| capacity as i64),
            },
            upsert: true,
        })
    }

    /// Inserts before `index`. Out-of-range indices clamp to the ends.
    ///
    /// Fails with [`MirrorError::CapacityExceeded`] when the sequence is
    /// bounded and full.
    pub fn insert(&self, index: isize, value: impl Into<Item>) -> Result<()> {
        let core = &self.inner.core;
        let _gate = core.begin()?;
        let base = core.path();
        let len = self.len();
        if let Some(capacity) = self.inner.capacity {
            if len >= capacity {
                return Err(MirrorError::CapacityExceeded {
                    path: base,
                    capacity,
                }
                .into());
            }
        }

        let position = if index < 0 {
            (index + len as isize).max(0) as usize
        } else {
            (index as usize).min(len)
        };
        let (mut items, stored) = self.materialize_all(&base, position, vec![value.into()])?;

        {
            let mut contents = self.inner.items.lock().unwrap();
            if let Some(item) = items.pop() {
                contents.insert(position, item);
            }
            reindex(&contents, &base);
        }
        core.submit(Patch::Push {
            path: base,
            push: PushEach {
                values: stored,
                position: Some(position),
                slice: None,
            },
            upsert: true,
        })
    }

    /// Removes and returns the last element.
    pub fn pop(&self) -> Result<Value> {
        self.pop_end(true)
    }

    /// Removes and returns the first element.
    pub fn pop_left(&self) -> Result<Value> {
        self.pop_end(false)
    }

    fn pop_end(&self, from_end: bool) -> Result<Value> {
        let core = &self.inner.core;
        let _gate = core.begin()?;
        let base = core.path();

        let item = {
            let mut contents = self.inner.items.lock().unwrap();
            let popped = if from_end {
                contents.pop_back()
            } else {
                contents.pop_front()
            };
            let Some(item) = popped else {
                return Err(MirrorError::EmptySequence { path: base }.into());
            };
            item.detach();
            reindex(&contents, &base);
            item
        };
        core.submit(Patch::Pop {
            path: base,
            from_end,
        })?;
        Ok(item.snapshot())
    }

    /// Removes the first element equal to `value`.
    ///
    /// Leaf elements are checked before child nodes, which compare by their
    /// flattened contents.
    pub fn remove(&self, value: &Value) -> Result<()> {
        let core = &self.inner.core;
        let _gate = core.begin()?;
        let base = core.path();

        let position = {
            let mut contents = self.inner.items.lock().unwrap();
            let found = contents
                .iter()
                .position(|item| item.as_value() == Some(value))
                .or_else(|| {
                    contents
                        .iter()
                        .position(|item| item.is_node() && item == value)
                });
            let Some(position) = found else {
                return Err(MirrorError::ValueNotFound { path: base }.into());
            };
            if let Some(item) = contents.remove(position) {
                item.detach();
            }
            reindex(&contents, &base);
            position
        };
        core.submit(Patch::PullPositions {
            path: base,
            positions: vec![position],
        })
    }

    /// Reverses the sequence in place.
    pub fn reverse(&self) -> Result<()> {
        let core = &self.inner.core;
        let _gate = core.begin()?;
        let base = core.path();
        {
            let mut contents = self.inner.items.lock().unwrap();
            if contents.is_empty() {
                return Ok(());
            }
            contents.make_contiguous().reverse();
            reindex(&contents, &base);
        }
        core.submit(Patch::Reverse { path: base })
    }

    /// Rotates right by `steps`; negative steps rotate left.
    pub fn rotate(&self, steps: i64) -> Result<()> {
        let core = &self.inner.core;
        let _gate = core.begin()?;
        let base = core.path();
        {
            let mut contents = self.inner.items.lock().unwrap();
            if contents.is_empty() {
                return Ok(());
            }
            patch::rotate(contents.make_contiguous(), steps);
            reindex(&contents, &base);
        }
        core.submit(Patch::Rotate { path: base, steps })
    }

    /// Removes every element, resetting the stored field to an empty array.
    pub fn clear(&self) -> Result<()> {
        let core = &self.inner.core;
        let _gate = core.begin()?;
        for item in self.inner.items.lock().unwrap().drain(..) {
            item.detach();
        }
        core.submit(Patch::Set {
            path: core.path(),
            value: Value::Array(Vec::new()),
            upsert: true,
        })
    }

    /// Replaces the element at `index`.
    pub fn set_item(&self, index: isize, value: impl Into<Item>) -> Result<()> {
        let core = &self.inner.core;
        let _gate = core.begin()?;
        let base = core.path();
        let len = self.len();
        let Some(position) = normalize(index, len) else {
            return Err(MirrorError::IndexOutOfRange {
                path: base,
                index,
                len,
            }
            .into());
        };

        let field = path::join(&base, position);
        let (mut items, mut stored) = self.materialize_all(&base, position, vec![value.into()])?;
        if let (Some(item), Some(value)) = (items.pop(), stored.pop()) {
            let old = std::mem::replace(&mut self.inner.items.lock().unwrap()[position], item);
            old.detach();
            core.submit(Patch::Set {
                path: field,
                value,
                upsert: true,
            })?;
        }
        Ok(())
    }

    /// Removes the element at `index`.
    pub fn del_item(&self, index: isize) -> Result<()> {
        let core = &self.inner.core;
        let _gate = core.begin()?;
        let base = core.path();

        let position = {
            let mut contents = self.inner.items.lock().unwrap();
            let len = contents.len();
            let Some(position) = normalize(index, len) else {
                return Err(MirrorError::IndexOutOfRange {
                    path: base,
                    index,
                    len,
                }
                .into());
            };
            if let Some(item) = contents.remove(position) {
                item.detach();
            }
            reindex(&contents, &base);
            position
        };
        core.submit(Patch::PullPositions {
            path: base,
            positions: vec![position],
        })
    }

    /// Assigns `values` to the positions selected by `slice`.
    ///
    /// With step 1 the selected range is replaced and the sequence may grow
    /// or shrink: in-range replacements become one multi-field set, surplus
    /// values one positional push, and a shortfall one positional pull. An
    /// empty range (`start >= stop`) is a pure insertion at `start`. Other
    /// steps require exactly one value per selected position.
    pub fn assign_slice<I>(&self, slice: Slice, values: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Item>,
    {
        let values = Self::collect(values);
        let core = &self.inner.core;
        let _gate = core.begin()?;
        let base = core.path();
        let len = self.len();
        let (start, stop, step) = slice.resolve(len)?;

        if step != 1 {
            return self.assign_extended(&base, slice.indices(len)?, values);
        }

        let start = start as usize;
        let stop = (stop as usize).max(start);
        let replaced = stop - start;
        let given = values.len();
        if let Some(capacity) = self.inner.capacity {
            if len - replaced + given > capacity {
                return Err(MirrorError::CapacityExceeded {
                    path: base,
                    capacity,
                }
                .into());
            }
        }

        let (items, stored) = self.materialize_all(&base, start, values)?;
        {
            let mut contents = self.inner.items.lock().unwrap();
            let mut tail = contents.split_off(start);
            for old in tail.drain(..replaced) {
                old.detach();
            }
            contents.extend(items);
            contents.append(&mut tail);
            reindex(&contents, &base);
        }

        let overlap = replaced.min(given);
        let mut stored = stored.into_iter();
        if overlap > 0 {
            let fields = (start..start + overlap)
                .map(|position| path::join(&base, position))
                .zip(stored.by_ref())
                .collect();
            core.submit(Patch::SetMany {
                fields,
                upsert: true,
            })?;
        }
        if given > replaced {
            core.submit(Patch::Push {
                path: base.clone(),
                push: PushEach {
                    values: stored.collect(),
                    position: Some(start + overlap),
                    slice: None,
                },
                upsert: true,
            })?;
        } else if given < replaced {
            core.submit(Patch::PullPositions {
                path: base,
                positions: (start + given..stop).collect(),
            })?;
        }
        Ok(())
    }

    fn assign_extended(&self, base: &str, indices: Vec<usize>, values: Vec<Item>) -> Result<()> {
        if indices.len() != values.len() {
            return Err(MirrorError::SliceLengthMismatch {
                expected: indices.len(),
                given: values.len(),
            }
            .into());
        }
        if indices.is_empty() {
            return Ok(());
        }

        let binding = self.binding();
        let mut fields = Vec::with_capacity(indices.len());
        let mut replacements = Vec::with_capacity(indices.len());
        for (&position, value) in indices.iter().zip(values) {
            let field = path::join(base, position);
            let item = hydrate::materialize(binding, field.clone(), value, Leaves::Local)?;
            fields.push((field, hydrate::dehydrate(&item, binding)));
            replacements.push((position, item));
        }

        {
            let mut contents = self.inner.items.lock().unwrap();
            for (position, item) in replacements {
                let old = std::mem::replace(&mut contents[position], item);
                old.detach();
            }
        }
        self.inner.core.submit(Patch::SetMany {
            fields,
            upsert: true,
        })
    }

    /// Extends the sequence with plain copies of `values` and returns it.
    pub fn concat<I>(&self, values: I) -> Result<&Self>
    where
        I: IntoIterator,
        I::Item: Into<Item>,
    {
        let flat: Vec<Item> = values
            .into_iter()
            .map(|value| Item::Value(Into::<Item>::into(value).snapshot()))
            .collect();
        self.extend(flat)?;
        Ok(self)
    }

    /// Extends the sequence with `times - 1` further copies of its current
    /// contents and returns it.
    pub fn repeat(&self, times: usize) -> Result<&Self> {
        let Value::Array(flat) = self.snapshot() else {
            return Ok(self);
        };
        let copies = times.saturating_sub(1);
        let repeated: Vec<Value> = std::iter::repeat_n(flat, copies).flatten().collect();
        self.extend(repeated)?;
        Ok(self)
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
        reindex(&self.inner.items.lock().unwrap(), &path);
    }

    pub(crate) fn detach(&self) {
        if !self.inner.core.detach() {
            return;
        }
        for item in self.inner.items.lock().unwrap().iter() {
            item.detach();
        }
    }
}

impl PartialEq<Value> for MirrorSeq {
    fn eq(&self, other: &Value) -> bool {
        self.snapshot() == *other
    }
}

impl fmt::Debug for MirrorSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorSeq")
            .field("path", &self.path())
            .field("capacity", &self.inner.capacity)
            .field("attached", &self.is_attached())
            .field("items", &self.snapshot())
            .finish()
    }
}
