//! WriteDispatcher tests against a real store.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use mirrordoc::{
    dispatch::{DispatcherOptions, OrderingKey, Priority, WriteDispatcher},
    store::{DocumentStore, PushEach, StoreError},
};
use serde_json::json;

use crate::helpers::*;

fn push_one(store: &Arc<impl DocumentStore>, id: &'static str, value: i64) -> mirrordoc::dispatch::WriteOp {
    let store = store.clone();
    Box::pin(async move {
        let push = PushEach {
            values: vec![json!(value)],
            ..PushEach::default()
        };
        store.push_each(&doc(id), "log", push, true).await
    })
}

#[tokio::test]
async fn test_same_key_applies_in_issue_order() {
    let store = jittered_store();
    let dispatcher = WriteDispatcher::start(DispatcherOptions::default());
    let key = OrderingKey::new("ordered");

    for i in 0..30 {
        dispatcher
            .enqueue(push_one(&store, "ordered", i), &key, Priority::NORMAL, "push_each")
            .unwrap();
    }
    dispatcher.drain(&key).await.unwrap();

    let expected: Vec<i64> = (0..30).collect();
    assert_eq!(
        stored(store.as_ref(), &doc("ordered"), "log").await,
        Some(json!(expected))
    );
    assert_eq!(dispatcher.pending(&key), 0);
}

#[tokio::test]
async fn test_keys_are_independent_lanes() {
    let store = jittered_store();
    let dispatcher = WriteDispatcher::start(DispatcherOptions::default());
    let keys = [OrderingKey::new("a"), OrderingKey::new("b")];

    for i in 0..10 {
        dispatcher
            .enqueue(push_one(&store, "a", i), &keys[0], Priority::LOW, "push_each")
            .unwrap();
        dispatcher
            .enqueue(push_one(&store, "b", i * 10), &keys[1], Priority::HIGH, "push_each")
            .unwrap();
    }
    dispatcher.flush().await.unwrap();

    let a: Vec<i64> = (0..10).collect();
    let b: Vec<i64> = (0..10).map(|i| i * 10).collect();
    assert_eq!(stored(store.as_ref(), &doc("a"), "log").await, Some(json!(a)));
    assert_eq!(stored(store.as_ref(), &doc("b"), "log").await, Some(json!(b)));
}

#[tokio::test]
async fn test_result_feed_keeps_latest() {
    let store = test_store();
    let dispatcher = WriteDispatcher::start(DispatcherOptions::default());
    let key = OrderingKey::new("feed");

    for i in 0..15 {
        dispatcher
            .enqueue(push_one(&store, "feed", i), &key, Priority::NORMAL, "push_each")
            .unwrap();
    }
    dispatcher.drain(&key).await.unwrap();

    let recent = dispatcher.recent_results();
    assert_eq!(recent.len(), 10);
    assert_eq!(dispatcher.results().evicted(), 5);
    let seqs: Vec<u64> = recent.iter().map(|report| report.seq).collect();
    assert_eq!(seqs, (5..15).collect::<Vec<u64>>());
    assert!(recent.iter().all(|report| report.label == "push_each"));

    assert_eq!(dispatcher.take_results().len(), 10);
    assert!(dispatcher.recent_results().is_empty());
}

#[tokio::test]
async fn test_unobserved_failure_halts_root() {
    let store = FlakyStore::new();
    let filter = doc("halt");
    let arr = open_seq(store.clone(), &filter, "l", json!([]), None).await;
    arr.drain().await.unwrap();

    store.fail_pushes(true);
    arr.append(1).unwrap();
    let err = arr.drain().await.unwrap_err();
    assert!(err.is_write_failure());

    let cause = arr.dispatcher().halted(arr.ordering_key()).unwrap();
    assert_eq!(cause.label, "push_each");
    assert!(matches!(cause.source, StoreError::Backend { .. }));

    // The halted root rejects further mutations without touching local state
    store.fail_pushes(false);
    let err = arr.append(2).unwrap_err();
    assert!(err.is_write_failure());
    assert_eq!(arr.snapshot(), json!([1]));
}

#[tokio::test]
async fn test_observed_failure_continues() {
    let store = FlakyStore::new();
    let observer = Arc::new(RecordingObserver::default());
    let filter = doc("observed");
    let arr = mirrordoc::MirrorBuilder::new()
        .store(store.clone())
        .filter(filter.clone())
        .path("l")
        .observer(observer.clone())
        .open_seq()
        .await
        .unwrap();

    store.fail_pushes(true);
    arr.append(1).unwrap();
    arr.drain().await.unwrap();
    store.fail_pushes(false);
    arr.append(2).unwrap();
    arr.drain().await.unwrap();

    assert_eq!(*observer.failures.lock().unwrap(), vec!["push_each"]);
    assert_eq!(observer.successes.load(Ordering::SeqCst), 1);
    // The failed push never reached the store
    assert_eq!(stored(store.as_ref(), &filter, "l").await, Some(json!([2])));
    assert_eq!(arr.snapshot(), json!([1, 2]));
}
