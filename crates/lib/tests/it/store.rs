//! InMemory store tests through the public API.
//!
//! Update semantics are unit tested next to the implementation; these tests
//! cover persistence and the store as seen by mirrored roots.

use std::sync::Arc;
use std::time::Duration;

use mirrordoc::store::{DocumentStore, InMemory, PushEach};
use serde_json::json;

use crate::helpers::*;

#[tokio::test]
async fn test_persisted_tree_rehydrates() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("store.json");
    let filter = doc("persisted");

    let store = test_store();
    let arr = open_seq(store.clone(), &filter, "inner.arr", json!([1, [2, 3]]), None).await;
    arr.append(json!({"k": [4]})).unwrap();
    child_seq(&arr, 1).append(5).unwrap();
    arr.drain().await.unwrap();
    store.save_to_file(&file).await.unwrap();

    let reloaded: Arc<InMemory> = Arc::new(InMemory::load_from_file(&file).await.unwrap());
    assert_eq!(reloaded.documents().await, store.documents().await);

    let again = open_seq(reloaded.clone(), &filter, "inner.arr", json!([]), None).await;
    assert_eq!(again.snapshot(), arr.snapshot());
    assert_eq!(again.snapshot(), json!([1, [2, 3, 5], {"k": [4]}]));
    assert_seq_paths(&again);
}

#[tokio::test]
async fn test_documents_are_kept_apart() {
    let store = test_store();
    let a = open_seq(store.clone(), &doc("a"), "l", json!([1]), None).await;
    let b = open_seq(store.clone(), &doc("b"), "l", json!([2]), None).await;
    a.append(10).unwrap();
    b.append_left(20).unwrap();

    assert_seq_converged(&a, store.as_ref()).await;
    assert_seq_converged(&b, store.as_ref()).await;
    assert_eq!(store.documents().await.len(), 2);
    assert_eq!(
        store.document(&doc("a")).await,
        Some(json!({"id": "a", "l": [1, 10]}))
    );
    assert_eq!(
        store.document(&doc("b")).await,
        Some(json!({"id": "b", "l": [20, 2]}))
    );
}

#[tokio::test]
async fn test_latency_store_applies_writes() {
    let store = Arc::new(InMemory::new().with_latency(Duration::from_millis(5)));
    let filter = doc("slow");
    let push = PushEach {
        values: vec![json!(1), json!(2)],
        ..PushEach::default()
    };
    let outcome = store.push_each(&filter, "l", push, true).await.unwrap();
    assert!(outcome.upserted);
    assert_eq!(stored(store.as_ref(), &filter, "l").await, Some(json!([1, 2])));
}

#[tokio::test]
async fn test_op_log_names_mirrored_writes() {
    let store = test_store();
    let filter = doc("log");
    let arr = open_seq(store.clone(), &filter, "l", json!([]), None).await;
    arr.drain().await.unwrap();
    store.clear_op_log();

    arr.extend([1, 2, 3]).unwrap();
    arr.pop_left().unwrap();
    arr.reverse().unwrap();
    arr.drain().await.unwrap();

    let kinds: Vec<&str> = store.op_log().iter().map(|op| op.kind).collect();
    assert_eq!(
        kinds,
        vec!["push_each", "pop_one_end", "reverse_array_field", "set_field"]
    );
    assert!(store.op_log().iter().all(|op| op.path == "l"));
}
