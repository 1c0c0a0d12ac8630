//! MirrorSeq behavior across nested trees.

use mirrordoc::{Item, Slice};
use serde_json::json;

use crate::helpers::*;

#[tokio::test]
async fn test_child_handles_follow_moves() {
    let store = jittered_store();
    let arr = open_seq(store.clone(), &doc("moves"), "l", json!([[1], [2], [3]]), None).await;
    let last = child_seq(&arr, 2);
    assert_eq!(last.path(), "l.2");

    arr.pop_left().unwrap();
    assert_eq!(last.path(), "l.1");
    arr.insert(0, json!([0])).unwrap();
    arr.insert(0, json!([-1])).unwrap();
    assert_eq!(last.path(), "l.3");
    arr.reverse().unwrap();
    assert_eq!(last.path(), "l.0");
    arr.rotate(-1).unwrap();
    assert_eq!(last.path(), "l.3");

    // The moved handle still mirrors into its new slot
    last.append(33).unwrap();
    assert_seq_paths(&arr);
    assert_seq_converged(&arr, store.as_ref()).await;
    assert_eq!(arr.get_value(3), Some(json!([3, 33])));
}

#[tokio::test]
async fn test_nested_sequences_are_unbounded() {
    let store = test_store();
    let arr = open_seq(store.clone(), &doc("cap"), "l", json!([]), Some(2)).await;
    arr.append(json!([1, 2, 3])).unwrap();

    let nested = child_seq(&arr, 0);
    assert_eq!(nested.capacity(), None);
    nested.extend([4, 5, 6]).unwrap();
    assert_eq!(nested.len(), 6);
    assert_eq!(arr.capacity(), Some(2));
    assert_seq_converged(&arr, store.as_ref()).await;
}

#[tokio::test]
async fn test_detached_nodes_stop_mirroring() {
    let store = test_store();
    let filter = doc("detached");
    let arr = open_seq(store.clone(), &filter, "l", json!([[1, 2], 3]), Some(2)).await;
    let evicted = child_seq(&arr, 0);

    // Capacity eviction detaches the front child
    arr.append(4).unwrap();
    assert!(!evicted.is_attached());
    arr.drain().await.unwrap();
    store.clear_op_log();

    evicted.append(99).unwrap();
    assert_eq!(evicted.snapshot(), json!([1, 2, 99]));
    arr.drain().await.unwrap();
    assert!(store.op_log().is_empty());
    assert_seq_converged(&arr, store.as_ref()).await;
    assert_eq!(stored(store.as_ref(), &filter, "l").await, Some(json!([3, 4])));
}

#[tokio::test]
async fn test_node_handle_value_is_copied() {
    let store = test_store();
    let arr = open_seq(store.clone(), &doc("copy"), "l", json!([[1, 2]]), None).await;
    let original = child_seq(&arr, 0);

    arr.append(original.clone()).unwrap();
    let copy = child_seq(&arr, 1);
    assert_eq!(copy.path(), "l.1");
    assert_eq!(original.path(), "l.0");

    copy.append(3).unwrap();
    assert_eq!(original.snapshot(), json!([1, 2]));
    assert_eq!(arr.snapshot(), json!([[1, 2], [1, 2, 3]]));
    assert_seq_converged(&arr, store.as_ref()).await;
}

#[tokio::test]
async fn test_slice_reads_are_plain() {
    let store = test_store();
    let arr = open_seq(store.clone(), &doc("slice"), "l", json!([0, [1], {"a": 2}, 3]), None).await;
    arr.drain().await.unwrap();
    store.clear_op_log();

    let copy = arr.slice(Slice::new(1, 3)).unwrap();
    assert_eq!(copy, vec![json!([1]), json!({"a": 2})]);
    assert_eq!(arr.slice(Slice::full().step(-2)).unwrap(), vec![json!(3), json!([1])]);
    assert!(store.op_log().is_empty());

    assert!(matches!(arr.get(1), Some(Item::Seq(_))));
    assert!(matches!(arr.get(2), Some(Item::Map(_))));
    assert!(arr.contains(&json!({"a": 2})));
}

#[tokio::test]
async fn test_extended_slice_assignment() {
    let store = test_store();
    let arr = open_seq(store.clone(), &doc("extended"), "l", json!([0, 1, 2, 3, 4, 5]), None).await;

    let err = arr
        .assign_slice(Slice::full().step(2), [json!(9)])
        .unwrap_err();
    assert!(err.is_bounds_error());
    assert_eq!(arr.len(), 6);

    arr.assign_slice(Slice::full().step(2), [json!("a"), json!(["b"]), json!("c")])
        .unwrap();
    assert_eq!(arr.snapshot(), json!(["a", 1, ["b"], 3, "c", 5]));
    assert_eq!(child_seq(&arr, 2).path(), "l.2");
    assert_seq_converged(&arr, store.as_ref()).await;
}

#[tokio::test]
async fn test_shortfall_and_insertion_slices() {
    let store = jittered_store();
    let arr = open_seq(store.clone(), &doc("shrink"), "l", json!([0, [1], 2, 3, [4]]), None).await;
    let tail = child_seq(&arr, 4);

    arr.assign_slice(Slice::new(1, 4), [json!("x")]).unwrap();
    assert_eq!(arr.snapshot(), json!([0, "x", [4]]));
    assert_eq!(tail.path(), "l.2");

    arr.assign_slice(Slice::new(1, 0), [json!("y"), json!("z")]).unwrap();
    assert_eq!(arr.snapshot(), json!([0, "y", "z", "x", [4]]));
    assert_eq!(tail.path(), "l.4");

    tail.append(5).unwrap();
    assert_seq_converged(&arr, store.as_ref()).await;
}

#[tokio::test]
async fn test_concat_and_repeat_extend_receiver() {
    let store = test_store();
    let arr = open_seq(store.clone(), &doc("repeat"), "l", json!([1, [2]]), Some(5)).await;

    arr.concat([3]).unwrap().repeat(2).unwrap();
    // [1, [2], 3] repeated once more, trimmed to the last five
    assert_eq!(arr.snapshot(), json!([[2], 3, 1, [2], 3]));
    assert_seq_paths(&arr);
    assert_seq_converged(&arr, store.as_ref()).await;
}

#[tokio::test]
async fn test_index_errors() {
    let store = test_store();
    let arr = open_seq(store.clone(), &doc("errors"), "l", json!([]), None).await;

    assert!(arr.pop().unwrap_err().is_bounds_error());
    assert!(arr.pop_left().unwrap_err().is_bounds_error());
    assert!(arr.set_item(0, 1).unwrap_err().is_bounds_error());
    assert!(arr.del_item(-1).unwrap_err().is_bounds_error());
    let err = arr.remove(&json!(1)).unwrap_err();
    assert!(err.is_not_found());

    // Reorders on an empty sequence are no-ops
    arr.reverse().unwrap();
    arr.rotate(3).unwrap();
    assert_seq_converged(&arr, store.as_ref()).await;
}
