//! End-to-end mutation scenarios with known store results.

use mirrordoc::Slice;
use serde_json::json;

use crate::helpers::*;

#[tokio::test]
async fn test_pop_key_from_map_root() {
    let store = test_store();
    let filter = doc("scenario-a");
    let map = open_map(store.clone(), &filter, "doc", json!({"a": 1, "b": {"c": 2}})).await;

    assert_eq!(map.pop("a").unwrap(), json!(1));
    map.drain().await.unwrap();

    assert_eq!(
        stored(store.as_ref(), &filter, "doc").await,
        Some(json!({"b": {"c": 2}}))
    );
    assert_eq!(child_map(&map, "b").path(), "doc.b");
}

#[tokio::test]
async fn test_append_left_on_full_sequence() {
    let store = test_store();
    let filter = doc("scenario-b");
    let arr = open_seq(store.clone(), &filter, "l", json!([1, 2, 3]), Some(3)).await;

    arr.append_left(0).unwrap();
    assert_eq!(arr.snapshot(), json!([0, 1, 2]));
    assert_seq_converged(&arr, store.as_ref()).await;
    assert_eq!(stored(store.as_ref(), &filter, "l").await, Some(json!([0, 1, 2])));
}

#[tokio::test]
async fn test_append_on_full_sequence() {
    let store = test_store();
    let filter = doc("bounded");
    let arr = open_seq(store.clone(), &filter, "l", json!([1, 2, 3]), Some(3)).await;

    arr.append(4).unwrap();
    assert_eq!(arr.snapshot(), json!([2, 3, 4]));
    assert_seq_converged(&arr, store.as_ref()).await;
    assert_eq!(stored(store.as_ref(), &filter, "l").await, Some(json!([2, 3, 4])));
}

#[tokio::test]
async fn test_remove_nested_value_leaves_no_sentinel() {
    let store = test_store();
    let filter = doc("scenario-c");
    let arr = open_seq(store.clone(), &filter, "l", json!([1, [2, 3], 4]), None).await;
    let nested = child_seq(&arr, 1);

    arr.remove(&json!([2, 3])).unwrap();
    assert_eq!(arr.snapshot(), json!([1, 4]));
    assert!(!nested.is_attached());
    assert_seq_converged(&arr, store.as_ref()).await;

    let document = store.document(&filter).await.unwrap();
    assert_eq!(document, json!({"id": "scenario-c", "l": [1, 4]}));
}

#[tokio::test]
async fn test_slice_assignment_with_surplus() {
    let store = test_store();
    let filter = doc("scenario-d");
    let arr = open_seq(store.clone(), &filter, "l", json!([1, 2, 3, 4, 5]), None).await;

    arr.assign_slice(Slice::new(1, 3), [9, 9, 9, 9]).unwrap();
    assert_eq!(arr.snapshot(), json!([1, 9, 9, 9, 9, 4, 5]));
    assert_seq_converged(&arr, store.as_ref()).await;
}

#[tokio::test]
async fn test_original_example() {
    let store = test_store();
    let filter = mirrordoc::store::Filter::new().eq("array_id", "example");
    let arr = open_seq(store.clone(), &filter, "inner.arr", json!([1, 2, [6, 7, 8]]), Some(10)).await;

    arr.append(9).unwrap();
    arr.pop_left().unwrap();
    let nested = child_seq(&arr, 1);
    nested
        .extend([json!("a"), json!("b"), json!([4, 5, 6])])
        .unwrap();
    child_seq(&nested, -1).pop().unwrap();
    assert_seq_paths(&arr);

    arr.drain().await.unwrap();
    assert_eq!(
        store.document(&filter).await,
        Some(json!({
            "array_id": "example",
            "inner": {"arr": [2, [6, 7, 8, "a", "b", [4, 5]], 9]}
        }))
    );
}
