//! MirrorMap behavior across nested trees.

use mirrordoc::{MirrorBuilder, store::DocumentStore};
use serde_json::json;

use crate::helpers::*;

#[tokio::test]
async fn test_nested_set_and_update() {
    let store = jittered_store();
    let map = open_map(store.clone(), &doc("nested"), "cfg", json!({})).await;

    map.set("name", "alpha").unwrap();
    map.set("limits", json!({"cpu": 2, "tags": ["a"]})).unwrap();
    let limits = child_map(&map, "limits");
    assert_eq!(limits.path(), "cfg.limits");

    limits.set("mem", 512).unwrap();
    let tags = limits
        .get("tags")
        .and_then(|item| item.as_seq().cloned())
        .unwrap();
    assert_eq!(tags.path(), "cfg.limits.tags");
    tags.append("b").unwrap();

    map.update([("name", json!("beta")), ("extra", json!([1, {"deep": true}]))])
        .unwrap();
    assert_map_paths(&map);
    assert_map_converged(&map, store.as_ref()).await;
    assert_eq!(
        map.snapshot(),
        json!({
            "name": "beta",
            "limits": {"cpu": 2, "tags": ["a", "b"], "mem": 512},
            "extra": [1, {"deep": true}]
        })
    );
}

#[tokio::test]
async fn test_update_is_one_store_write() {
    let store = test_store();
    let map = open_map(store.clone(), &doc("update"), "m", json!({"a": 1})).await;
    map.drain().await.unwrap();
    store.clear_op_log();

    map.update([("a", 10), ("b", 20), ("c", 30)]).unwrap();
    map.drain().await.unwrap();

    let log = store.op_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, "set_multiple_fields");
    assert_eq!(log[0].path, "m.a,m.b,m.c");
    assert_map_converged(&map, store.as_ref()).await;
}

#[tokio::test]
async fn test_missing_keys() {
    let store = test_store();
    let map = open_map(store.clone(), &doc("missing"), "m", json!({"a": 1})).await;

    assert!(map.pop("zzz").unwrap_err().is_not_found());
    assert!(map.delete("zzz").unwrap_err().is_not_found());
    assert_eq!(map.pop_item().unwrap(), ("a".to_string(), json!(1)));
    assert!(map.pop_item().unwrap_err().is_not_found());
    assert_map_converged(&map, store.as_ref()).await;
}

#[tokio::test]
async fn test_replaced_child_is_detached() {
    let store = test_store();
    let filter = doc("replace");
    let map = open_map(store.clone(), &filter, "m", json!({"child": {"x": 1}})).await;
    let old = child_map(&map, "child");

    map.set("child", json!({"y": 2})).unwrap();
    assert!(!old.is_attached());
    old.set("x", 100).unwrap();

    assert_map_converged(&map, store.as_ref()).await;
    assert_eq!(
        stored(store.as_ref(), &filter, "m").await,
        Some(json!({"child": {"y": 2}}))
    );
}

#[tokio::test]
async fn test_clear_then_refill() {
    let store = test_store();
    let map = open_map(store.clone(), &doc("clear"), "m", json!({"a": [1], "b": 2})).await;
    let a = map.get("a").and_then(|item| item.as_seq().cloned()).unwrap();

    map.clear().unwrap();
    assert!(map.is_empty());
    assert!(!a.is_attached());
    map.set("c", 3).unwrap();
    assert_map_converged(&map, store.as_ref()).await;
    assert_eq!(map.snapshot(), json!({"c": 3}));
}

#[tokio::test]
async fn test_map_inside_sequence() {
    let store = test_store();
    let arr = open_seq(store.clone(), &doc("mixed"), "l", json!([{"k": 1}]), None).await;
    let entry = arr.get(0).and_then(|item| item.as_map().cloned()).unwrap();

    arr.append_left(0).unwrap();
    assert_eq!(entry.path(), "l.1");
    entry.set("k", json!([2])).unwrap();
    assert_eq!(
        entry.get("k").and_then(|item| item.path()),
        Some("l.1.k".to_string())
    );
    assert_seq_converged(&arr, store.as_ref()).await;
    assert_eq!(arr.snapshot(), json!([0, {"k": [2]}]));
}

#[tokio::test]
async fn test_rehydrated_map_round_trips() {
    let store = test_store();
    let filter = doc("round-trip");
    let map = open_map(
        store.clone(),
        &filter,
        "root",
        json!({"s": "x", "n": [1, [2, {"m": null}]], "o": {}}),
    )
    .await;
    map.set("late", json!({"z": [0]})).unwrap();
    map.drain().await.unwrap();

    let again = MirrorBuilder::new()
        .store(store.clone())
        .filter(filter.clone())
        .path("root")
        .open_map()
        .await
        .unwrap();
    assert_eq!(again.snapshot(), map.snapshot());
    assert_map_paths(&again);
    assert_eq!(
        store.find_one(&filter, "root.late.z").await.unwrap(),
        Some(json!([0]))
    );
}
