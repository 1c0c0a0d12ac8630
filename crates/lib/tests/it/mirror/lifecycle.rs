//! Opening, sharing and shutting down roots.

use std::time::Duration;

use mirrordoc::{
    MirrorBuilder,
    dispatch::{DispatcherOptions, WriteDispatcher},
    store::InMemory,
};
use serde_json::json;

use crate::helpers::*;

#[tokio::test]
async fn test_missing_bindings() {
    let err = MirrorBuilder::new()
        .filter(doc("x"))
        .path("l")
        .open_seq()
        .await
        .unwrap_err();
    assert!(err.is_missing_binding());

    let err = MirrorBuilder::new()
        .store(test_store())
        .path("l")
        .open_map()
        .await
        .unwrap_err();
    assert!(err.is_missing_binding());

    let err = MirrorBuilder::new()
        .store(test_store())
        .filter(doc("x"))
        .path("..")
        .open_map()
        .await
        .unwrap_err();
    assert!(err.is_missing_binding());
}

#[tokio::test]
async fn test_stored_kind_mismatch() {
    let store = std::sync::Arc::new(InMemory::with_documents(vec![
        json!({"id": "kind", "m": {"a": 1}}),
    ]));
    let err = MirrorBuilder::new()
        .store(store.clone())
        .filter(doc("kind"))
        .path("m")
        .open_seq()
        .await
        .unwrap_err();
    assert!(err.is_type_error());
    assert_eq!(err.module(), "mirror");

    let map = open_map(store.clone(), &doc("kind"), "m", json!({})).await;
    assert_eq!(map.snapshot(), json!({"a": 1}));
}

#[tokio::test]
async fn test_shutdown_drains_then_closes() {
    let store = std::sync::Arc::new(InMemory::new().with_latency(Duration::from_millis(2)));
    let filter = doc("shutdown");
    let arr = open_seq(store.clone(), &filter, "l", json!([]), None).await;

    for i in 0..10 {
        arr.append(i).unwrap();
    }
    arr.shutdown().await.unwrap();
    assert!(arr.dispatcher().is_closed());
    assert_eq!(
        stored(store.as_ref(), &filter, "l").await,
        Some(json!([0, 1, 2, 3, 4, 5, 6, 7, 8, 9]))
    );

    let err = arr.append(10).unwrap_err();
    assert!(err.is_closed());
    assert_eq!(arr.len(), 10);
    // Draining a closed root has nothing left to wait for
    arr.drain().await.unwrap();
}

#[tokio::test]
async fn test_dropped_root_finishes_writes() {
    let store = std::sync::Arc::new(InMemory::new().with_latency(Duration::from_millis(1)));
    let filter = doc("dropped");
    {
        let arr = open_seq(store.clone(), &filter, "l", json!([]), None).await;
        arr.extend([1, 2, 3]).unwrap();
        arr.append(json!([4])).unwrap();
    }

    let mut remote = None;
    for _ in 0..200 {
        remote = stored(store.as_ref(), &filter, "l").await;
        if remote == Some(json!([1, 2, 3, [4]])) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(remote, Some(json!([1, 2, 3, [4]])));
}

#[tokio::test]
async fn test_shared_dispatcher_serves_many_roots() {
    let store = jittered_store();
    let dispatcher = WriteDispatcher::start(DispatcherOptions::default().with_max_in_flight(1));
    let open = |id: &'static str| {
        MirrorBuilder::new()
            .store(store.clone())
            .filter(doc(id))
            .path("l")
            .dispatcher(dispatcher.clone())
            .open_seq()
    };
    let a = open("shared-a").await.unwrap();
    let b = open("shared-b").await.unwrap();
    assert_ne!(a.ordering_key(), b.ordering_key());

    for i in 0..5 {
        a.append(i).unwrap();
        b.append_left(i).unwrap();
    }
    dispatcher.flush().await.unwrap();
    assert_seq_converged(&a, store.as_ref()).await;
    assert_seq_converged(&b, store.as_ref()).await;
    assert_eq!(b.snapshot(), json!([4, 3, 2, 1, 0]));

    // Roots on a shared dispatcher only drain on shutdown
    a.shutdown().await.unwrap();
    assert!(!dispatcher.is_closed());
    b.append(9).unwrap();
    assert_seq_converged(&b, store.as_ref()).await;
}

#[tokio::test]
async fn test_roots_on_one_document() {
    let store = jittered_store();
    let filter = doc("two-roots");
    let left = open_seq(store.clone(), &filter, "left", json!([]), None).await;
    let right = open_map(store.clone(), &filter, "right", json!({})).await;

    for i in 0..5 {
        left.append(i).unwrap();
        right.set(format!("k{i}"), i).unwrap();
    }
    assert_seq_converged(&left, store.as_ref()).await;
    assert_map_converged(&right, store.as_ref()).await;
    assert_eq!(store.documents().await.len(), 1);
}
