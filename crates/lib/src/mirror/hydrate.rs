//! Building node trees from plain values and flattening them back.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::{Binding, Item, Kind, MirrorError, MirrorMap, MirrorSeq};
use crate::{
    Result,
    store::path::{self, validate_component},
};

/// Where the leaves of a value come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Leaves {
    /// Loaded from the store; run them through `decode`.
    Stored,
    /// Supplied by the caller; keep them as they are.
    Local,
}

/// Turns an item entering a tree at `path` into its in-tree form: nested
/// arrays and objects become child nodes, node handles are copied into new
/// children, leaves pass through (decoded when `leaves` is `Stored`).
pub(crate) fn materialize(
    binding: &Arc<Binding>,
    path: String,
    item: Item,
    leaves: Leaves,
) -> Result<Item> {
    match item {
        Item::Value(value) => build(binding, path, value, leaves),
        node => build(binding, path, node.snapshot(), Leaves::Local),
    }
}

fn build(binding: &Arc<Binding>, path: String, value: Value, leaves: Leaves) -> Result<Item> {
    match value {
        Value::Object(fields) => {
            let entries = children_of_map(binding, &path, fields, leaves)?;
            Ok(Item::Map(MirrorMap::child(binding.clone(), path, entries)))
        }
        Value::Array(values) => {
            let items = children_of_seq(binding, &path, values, leaves)?;
            Ok(Item::Seq(MirrorSeq::child(binding.clone(), path, items)))
        }
        leaf => Ok(Item::Value(match leaves {
            Leaves::Stored => binding.codec.decode(&leaf),
            Leaves::Local => leaf,
        })),
    }
}

pub(crate) fn children_of_map(
    binding: &Arc<Binding>,
    base: &str,
    fields: Map<String, Value>,
    leaves: Leaves,
) -> Result<Vec<(String, Item)>> {
    fields
        .into_iter()
        .map(|(key, value)| -> Result<(String, Item)> {
            validate_component(&key).map_err(MirrorError::from)?;
            let item = build(binding, path::join(base, &key), value, leaves)?;
            Ok((key, item))
        })
        .collect()
}

pub(crate) fn children_of_seq(
    binding: &Arc<Binding>,
    base: &str,
    values: Vec<Value>,
    leaves: Leaves,
) -> Result<Vec<Item>> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| build(binding, path::join(base, index), value, leaves))
        .collect()
}

/// Flattens an item into its stored form, encoding every leaf.
pub(crate) fn dehydrate(item: &Item, binding: &Binding) -> Value {
    match item {
        Item::Value(leaf) => binding.codec.encode(leaf),
        Item::Map(map) => map.dehydrate(),
        Item::Seq(seq) => seq.dehydrate(),
    }
}

/// Reads the value at a root path, creating an empty placeholder of `kind`
/// when the document or the field is absent.
pub(crate) async fn fetch(binding: &Binding, path: &str, kind: Kind) -> Result<Value> {
    let stored = binding.store.find_one(&binding.filter, path).await?;
    match stored {
        Some(value) => Ok(value),
        None => Ok(binding
            .store
            .find_one_and_create_if_absent(&binding.filter, kind.empty(), path)
            .await?),
    }
}

/// Decision on what a freshly opened root holds.
#[derive(Debug, PartialEq)]
pub(crate) struct Resolved {
    pub(crate) value: Value,
    pub(crate) leaves: Leaves,
    /// The chosen contents differ from the store and must be written.
    pub(crate) write_through: bool,
}

/// Chooses between the stored value and the caller's initial value.
///
/// A non-empty stored value wins unless `overwrite` is set. A stored value of
/// the wrong shape is an error unless `overwrite` is set.
pub(crate) fn resolve(
    path: &str,
    kind: Kind,
    stored: Value,
    initial: Option<Value>,
    overwrite: bool,
) -> Result<Resolved> {
    if let Some(initial) = &initial {
        if !kind.matches(initial) {
            return Err(MirrorError::TypeMismatch {
                path: path.to_string(),
                expected: kind.name(),
                found: path::kind_name(initial),
            }
            .into());
        }
    }

    let shape_ok = kind.matches(&stored) || stored.is_null();
    if !shape_ok && !overwrite {
        return Err(MirrorError::TypeMismatch {
            path: path.to_string(),
            expected: kind.name(),
            found: path::kind_name(&stored),
        }
        .into());
    }

    let stored_empty = match &stored {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };

    let resolved = match initial {
        Some(initial) if overwrite || stored_empty => Resolved {
            value: initial,
            leaves: Leaves::Local,
            write_through: true,
        },
        _ if !shape_ok || stored.is_null() => Resolved {
            value: kind.empty(),
            leaves: Leaves::Local,
            write_through: true,
        },
        _ => Resolved {
            value: stored,
            leaves: Leaves::Stored,
            write_through: false,
        },
    };
    Ok(resolved)
}
