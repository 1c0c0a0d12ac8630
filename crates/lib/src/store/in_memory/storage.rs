//! Core document operations for the InMemory store

use serde_json::Value;

use super::InMemory;
use crate::store::{
    Filter, PushEach, StoreError, StoreResult, WriteOutcome,
    path::{self, kind_name},
};

/// Applies `mutate` to the first document matching `filter`.
///
/// The mutation runs against a copy that only replaces the stored document
/// when it succeeds, so a failed update never leaves a half-applied change.
/// With `upsert`, a missing document is seeded from the filter first.
async fn update_one<F>(
    backend: &InMemory,
    filter: &Filter,
    upsert: bool,
    mutate: F,
) -> StoreResult<WriteOutcome>
where
    F: FnOnce(&mut Value) -> StoreResult<bool>,
{
    let mut documents = backend.documents.write().await;

    if let Some(document) = documents.iter_mut().find(|doc| filter.matches(doc)) {
        let mut updated = document.clone();
        let modified = mutate(&mut updated)?;
        *document = updated;
        return Ok(WriteOutcome::matched(modified));
    }

    if !upsert {
        return Ok(WriteOutcome::unmatched());
    }

    let mut document = filter.seed_document()?;
    mutate(&mut document)?;
    documents.push(document);
    Ok(WriteOutcome::upserted())
}

pub(crate) async fn find_one(backend: &InMemory, filter: &Filter, path: &str) -> Option<Value> {
    let documents = backend.documents.read().await;
    documents
        .iter()
        .find(|doc| filter.matches(doc))
        .and_then(|doc| path::lookup(doc, path))
        .cloned()
}

pub(crate) async fn find_one_and_create_if_absent(
    backend: &InMemory,
    filter: &Filter,
    initial: Value,
    path: &str,
) -> StoreResult<Value> {
    let mut documents = backend.documents.write().await;

    if let Some(document) = documents.iter_mut().find(|doc| filter.matches(doc)) {
        if let Some(existing) = path::lookup(document, path) {
            return Ok(existing.clone());
        }
        path::assign(document, path, initial.clone())?;
        return Ok(initial);
    }

    let mut document = filter.seed_document()?;
    path::assign(&mut document, path, initial.clone())?;
    documents.push(document);
    Ok(initial)
}

pub(crate) async fn set_field(
    backend: &InMemory,
    filter: &Filter,
    path: &str,
    value: Value,
    upsert: bool,
) -> StoreResult<WriteOutcome> {
    update_one(backend, filter, upsert, |doc| {
        let changed = path::lookup(doc, path) != Some(&value);
        path::assign(doc, path, value)?;
        Ok(changed)
    })
    .await
}

pub(crate) async fn unset_field(
    backend: &InMemory,
    filter: &Filter,
    path: &str,
) -> StoreResult<WriteOutcome> {
    update_one(backend, filter, false, |doc| Ok(path::unset(doc, path))).await
}

pub(crate) async fn push_each(
    backend: &InMemory,
    filter: &Filter,
    path: &str,
    push: PushEach,
    upsert: bool,
) -> StoreResult<WriteOutcome> {
    update_one(backend, filter, upsert, |doc| {
        let Some(items) = path::array_mut(doc, path, true)? else {
            return Ok(false);
        };

        let at = push.position.unwrap_or(items.len()).min(items.len());
        items.splice(at..at, push.values);

        match push.slice {
            Some(bound) if bound >= 0 => items.truncate(bound as usize),
            Some(bound) => {
                let keep = bound.unsigned_abs() as usize;
                if items.len() > keep {
                    items.drain(..items.len() - keep);
                }
            }
            None => {}
        }
        Ok(true)
    })
    .await
}

pub(crate) async fn pop_one_end(
    backend: &InMemory,
    filter: &Filter,
    path: &str,
    from_end: bool,
) -> StoreResult<WriteOutcome> {
    update_one(backend, filter, false, |doc| {
        let Some(items) = path::array_mut(doc, path, false)? else {
            return Ok(false);
        };
        if items.is_empty() {
            return Ok(false);
        }
        if from_end {
            items.pop();
        } else {
            items.remove(0);
        }
        Ok(true)
    })
    .await
}

pub(crate) async fn pull_equal(
    backend: &InMemory,
    filter: &Filter,
    path: &str,
    value: &Value,
) -> StoreResult<WriteOutcome> {
    update_one(backend, filter, false, |doc| {
        let Some(items) = path::array_mut(doc, path, false)? else {
            return Ok(false);
        };
        let before = items.len();
        items.retain(|item| item != value);
        Ok(items.len() != before)
    })
    .await
}

pub(crate) async fn reverse_array_field(
    backend: &InMemory,
    filter: &Filter,
    path: &str,
) -> StoreResult<Option<Value>> {
    let documents = backend.documents.read().await;
    let Some(document) = documents.iter().find(|doc| filter.matches(doc)) else {
        return Ok(None);
    };

    match path::lookup(document, path) {
        Some(Value::Array(items)) => Ok(Some(Value::Array(items.iter().rev().cloned().collect()))),
        Some(other) => Err(StoreError::conflict(
            path,
            format!("cannot reverse {}", kind_name(other)),
        )),
        None => Ok(None),
    }
}

pub(crate) async fn set_multiple_fields(
    backend: &InMemory,
    filter: &Filter,
    fields: Vec<(String, Value)>,
    upsert: bool,
) -> StoreResult<WriteOutcome> {
    update_one(backend, filter, upsert, |doc| {
        let mut changed = false;
        for (path, value) in fields {
            changed |= path::lookup(doc, &path) != Some(&value);
            path::assign(doc, &path, value)?;
        }
        Ok(changed)
    })
    .await
}
