//! MirrorConfig loading and how roots apply it.

use mirrordoc::{MirrorBuilder, MirrorConfig, dispatch::Priority};
use serde_json::json;

use crate::helpers::*;

#[tokio::test]
async fn test_loaded_config_shapes_dispatcher() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mirror.json");
    tokio::fs::write(&path, r#"{"result_capacity": 3, "default_priority": 5}"#)
        .await
        .unwrap();
    let config = MirrorConfig::load(&path).await.unwrap();

    let store = test_store();
    let arr = MirrorBuilder::new()
        .config(&config)
        .store(store.clone())
        .filter(doc("cfg"))
        .path("l")
        .open_seq()
        .await
        .unwrap();
    assert_eq!(arr.dispatcher().results().capacity(), 3);

    for i in 0..5 {
        arr.append(i).unwrap();
    }
    arr.drain().await.unwrap();
    assert_eq!(arr.dispatcher().recent_results().len(), 3);
    assert_eq!(arr.dispatcher().results().evicted(), 2);
}

#[tokio::test]
async fn test_config_overwrite_replaces_stored_value() {
    let store = test_store();
    let filter = doc("cfg-overwrite");
    let first = open_seq(store.clone(), &filter, "l", json!([1, 2]), None).await;
    first.shutdown().await.unwrap();

    let config = MirrorConfig {
        overwrite: true,
        ..MirrorConfig::default()
    };
    let second = MirrorBuilder::new()
        .config(&config)
        .store(store.clone())
        .filter(filter.clone())
        .path("l")
        .initial(json!([7]))
        .open_seq()
        .await
        .unwrap();
    assert_eq!(second.snapshot(), json!([7]));
    assert_seq_converged(&second, store.as_ref()).await;

    // An explicit builder call wins over the config
    let third = MirrorBuilder::new()
        .config(&config)
        .overwrite(false)
        .priority(Priority::HIGH)
        .store(store.clone())
        .filter(filter)
        .path("l")
        .initial(json!([9]))
        .open_seq()
        .await
        .unwrap();
    assert_eq!(third.snapshot(), json!([7]));
}

#[tokio::test]
async fn test_missing_config_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = MirrorConfig::load(dir.path().join("none.json")).await.unwrap();
    assert_eq!(config, MirrorConfig::default());
}
