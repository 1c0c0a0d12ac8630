//! Dot-delimited field paths.
//!
//! Paths locate values inside a stored document, `"inner.arr.2.b"` style.
//! Numeric segments address sequence positions when the value they are
//! applied to is an array, and plain keys otherwise. Navigation follows the
//! update semantics of common document stores: setting through a missing
//! intermediate creates an empty mapping, setting past the end of an array
//! pads it with nulls, and unsetting an array element nulls it out.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use super::errors::StoreError;

/// Error type for path component validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// Invalid component: components cannot contain dots or be empty.
    #[error("Invalid component '{component}': {reason}")]
    InvalidComponent { component: String, reason: String },
}

/// Normalizes a path string by cleaning up dots and empty components.
///
/// - Leading dots ".inner" → "inner"
/// - Trailing dots "inner." → "inner"
/// - Consecutive dots "inner..arr" → "inner.arr"
/// - Pure dots "..." → empty string
///
/// # Examples
///
/// ```rust
/// # use mirrordoc::store::path::normalize_path;
/// assert_eq!(normalize_path(""), "");
/// assert_eq!(normalize_path(".inner"), "inner");
/// assert_eq!(normalize_path("inner..arr."), "inner.arr");
/// assert_eq!(normalize_path("inner.arr.2"), "inner.arr.2");
/// ```
pub fn normalize_path(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    input
        .split('.')
        .filter(|component| !component.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Checks that `component` can be used as a single path segment.
pub fn validate_component(component: &str) -> Result<(), PathError> {
    if component.is_empty() {
        return Err(PathError::InvalidComponent {
            component: component.to_string(),
            reason: "components cannot be empty".to_string(),
        });
    }
    if component.contains('.') {
        return Err(PathError::InvalidComponent {
            component: component.to_string(),
            reason: "components cannot contain dots".to_string(),
        });
    }
    Ok(())
}

/// Appends one segment to `base`.
pub fn join(base: &str, segment: impl fmt::Display) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{base}.{segment}")
    }
}

/// Iterates the non-empty segments of `path`.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

/// Returns the value at `path`, if every segment resolves.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Mutable counterpart of [`lookup`].
pub fn lookup_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    segments(path).try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

/// Sets `value` at `path`, creating intermediate mappings as needed.
pub fn assign(root: &mut Value, path: &str, value: Value) -> Result<(), StoreError> {
    let parts: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = parts.split_last() else {
        return Err(StoreError::InvalidPath {
            path: path.to_string(),
            reason: "path is empty".to_string(),
        });
    };

    let mut current = root;
    for segment in parents {
        current = child_or_create(current, segment, path)?;
    }

    match current {
        Value::Object(map) => {
            map.insert((*last).to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = parse_index(last, path)?;
            if index < items.len() {
                items[index] = value;
            } else {
                items.resize(index, Value::Null);
                items.push(value);
            }
            Ok(())
        }
        other => Err(StoreError::conflict(
            path,
            format!("cannot set a field inside {}", kind_name(other)),
        )),
    }
}

/// Removes the value at `path`. Array elements are nulled rather than
/// removed so that sibling positions never shift. Returns whether anything
/// changed.
pub fn unset(root: &mut Value, path: &str) -> bool {
    let parts: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = parts.split_last() else {
        return false;
    };
    let parent_path = parents.join(".");
    let parent = if parent_path.is_empty() {
        Some(root)
    } else {
        lookup_mut(root, &parent_path)
    };

    match parent {
        Some(Value::Object(map)) => map.shift_remove(*last).is_some(),
        Some(Value::Array(items)) => match last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            Some(slot) if !slot.is_null() => {
                *slot = Value::Null;
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// Returns the array at `path`, creating an empty one when the path is absent
/// and `create` is set.
pub fn array_mut<'a>(
    root: &'a mut Value,
    path: &str,
    create: bool,
) -> Result<Option<&'a mut Vec<Value>>, StoreError> {
    if lookup(root, path).is_none() {
        if !create {
            return Ok(None);
        }
        assign(root, path, Value::Array(Vec::new()))?;
    }

    match lookup_mut(root, path) {
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(StoreError::conflict(
            path,
            format!("expected an array, found {}", kind_name(other)),
        )),
        None => Ok(None),
    }
}

/// Human readable name of a JSON value's kind.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}

fn child_or_create<'a>(
    current: &'a mut Value,
    segment: &str,
    path: &str,
) -> Result<&'a mut Value, StoreError> {
    match current {
        Value::Object(map) => Ok(map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()))),
        Value::Array(items) => {
            let index = parse_index(segment, path)?;
            if index >= items.len() {
                items.resize(index, Value::Null);
                items.push(Value::Object(Map::new()));
            }
            Ok(&mut items[index])
        }
        other => Err(StoreError::conflict(
            path,
            format!("cannot traverse into {}", kind_name(other)),
        )),
    }
}

fn parse_index(segment: &str, path: &str) -> Result<usize, StoreError> {
    segment.parse::<usize>().map_err(|_| {
        StoreError::conflict(path, format!("'{segment}' is not an array position"))
    })
}
