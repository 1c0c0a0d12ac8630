//! Remote patches.
//!
//! A [`Patch`] is the store-side half of a mutating call: the minimal write
//! (or short fixed sequence of writes) that brings the stored document in
//! line with the local change. Patches are built synchronously by the nodes
//! and applied later on the write dispatcher, so everything they need is
//! captured by value.

use serde_json::Value;
use uuid::Uuid;

use crate::{
    constants::SENTINEL_PREFIX,
    store::{DocumentStore, Filter, PushEach, StoreResult, WriteOutcome, path},
};

/// One remote update.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Set one field.
    Set {
        path: String,
        value: Value,
        upsert: bool,
    },
    /// Set several fields in one write.
    SetMany {
        fields: Vec<(String, Value)>,
        upsert: bool,
    },
    /// Remove one field.
    Unset { path: String },
    /// Push values into an array, optionally at a position and trimmed.
    Push {
        path: String,
        push: PushEach,
        upsert: bool,
    },
    /// Remove the first or last array element.
    Pop { path: String, from_end: bool },
    /// Remove array elements by position: overwrite each with a one-off
    /// sentinel, then pull every element equal to it.
    PullPositions { path: String, positions: Vec<usize> },
    /// Reverse an array using the store-side projection, then write it back.
    Reverse { path: String },
    /// Rotate an array right by `steps` (left when negative) with a
    /// read-modify-write of the field.
    Rotate { path: String, steps: i64 },
}

impl Patch {
    /// Operation name used in dispatcher reports and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Patch::Set { .. } => "set_field",
            Patch::SetMany { .. } => "set_multiple_fields",
            Patch::Unset { .. } => "unset_field",
            Patch::Push { .. } => "push_each",
            Patch::Pop { .. } => "pop_one_end",
            Patch::PullPositions { .. } => "pull_positions",
            Patch::Reverse { .. } => "reverse",
            Patch::Rotate { .. } => "rotate",
        }
    }

    /// Applies the patch to the document selected by `filter`.
    pub async fn apply(self, store: &dyn DocumentStore, filter: &Filter) -> StoreResult<WriteOutcome> {
        match self {
            Patch::Set {
                path,
                value,
                upsert,
            } => store.set_field(filter, &path, value, upsert).await,
            Patch::SetMany { fields, upsert } => {
                store.set_multiple_fields(filter, fields, upsert).await
            }
            Patch::Unset { path } => store.unset_field(filter, &path).await,
            Patch::Push { path, push, upsert } => store.push_each(filter, &path, push, upsert).await,
            Patch::Pop { path, from_end } => store.pop_one_end(filter, &path, from_end).await,
            Patch::PullPositions { path, positions } => {
                if positions.is_empty() {
                    return Ok(WriteOutcome::matched(false));
                }
                let sentinel = Value::String(format!("{SENTINEL_PREFIX}{}", Uuid::new_v4()));
                let fields = positions
                    .iter()
                    .map(|position| (path::join(&path, position), sentinel.clone()))
                    .collect();
                store.set_multiple_fields(filter, fields, false).await?;
                store.pull_equal(filter, &path, &sentinel).await
            }
            Patch::Reverse { path } => match store.reverse_array_field(filter, &path).await? {
                Some(reversed) => store.set_field(filter, &path, reversed, false).await,
                None => Ok(WriteOutcome::unmatched()),
            },
            Patch::Rotate { path, steps } => {
                let Some(Value::Array(mut items)) = store.find_one(filter, &path).await? else {
                    return Ok(WriteOutcome::unmatched());
                };
                rotate(&mut items, steps);
                store.set_field(filter, &path, Value::Array(items), false).await
            }
        }
    }
}

/// Rotates right by `steps`, left when negative.
pub(crate) fn rotate<T>(items: &mut [T], steps: i64) {
    if items.is_empty() {
        return;
    }
    let shift = steps.rem_euclid(items.len() as i64) as usize;
    items.rotate_right(shift);
}
