// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property state surviving a reopen of the settings file.

use std::sync::Arc;

use mrtooley_core::Value;
use mrtooley_properties::{DataType, PropertySpec, PropertyStore, PropertyTree, ValuePool};
use mrtooley_storage::{JsonFile, OpenOptions, StorageMapping};

async fn open_store(path: &std::path::Path) -> PropertyStore {
    let file = JsonFile::open(path, OpenOptions::create()).await.unwrap();
    let settings = StorageMapping::root(Arc::new(file));
    let store = PropertyStore::new(PropertyTree::new(), settings);
    store.add("", "scanner", PropertySpec::dict()).await.unwrap();
    store
        .add(
            "scanner",
            "target",
            PropertySpec::input(DataType::String, "127.0.0.1"),
        )
        .await
        .unwrap();
    store
        .add(
            "scanner",
            "speed",
            PropertySpec::input(DataType::Enum, 3)
                .pool(ValuePool::new([(1, "slow"), (3, "normal"), (5, "insane")])),
        )
        .await
        .unwrap();
    store
        .add(
            "scanner",
            "ratio",
            PropertySpec::input(DataType::Float, 0.5).float_precision(3),
        )
        .await
        .unwrap();
    store
        .add(
            "scanner",
            "found",
            PropertySpec::output(DataType::String, ""),
        )
        .await
        .unwrap();
    store
        .add("", "report", PropertySpec::dict())
        .await
        .unwrap();
    store
        .add("report", "host", PropertySpec::input(DataType::String, ""))
        .await
        .unwrap();
    store.load().await.unwrap();
    store
}

#[tokio::test]
async fn values_links_and_precision_survive_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("props.json");

    {
        let store = open_store(&path).await;
        store.set_value("scanner/target", "10.0.0.0/24").await.unwrap();
        store.set_value("scanner/speed", "insane").await.unwrap();
        store.set_float_precision("scanner/ratio", 1).await.unwrap();
        store.set_value("scanner/ratio", 0.26).await.unwrap();
        store.link("scanner/found", "report/host").await.unwrap();
        store.set_output("scanner/found", "10.0.0.7").await.unwrap();
        store.stop().await.unwrap();
    }

    let store = open_store(&path).await;
    assert_eq!(
        store.read("scanner/target").await.unwrap(),
        Value::Str("10.0.0.0/24".into())
    );
    assert_eq!(store.read("scanner/speed").await.unwrap(), Value::Int(5));
    assert_eq!(store.read("scanner/ratio").await.unwrap(), Value::Float(0.3));
    assert_eq!(
        store.read("report/host").await.unwrap(),
        Value::Str("10.0.0.7".into())
    );

    // The link is restored: new outputs still reach the report.
    store.set_output("scanner/found", "10.0.0.9").await.unwrap();
    assert_eq!(
        store.read("report/host").await.unwrap(),
        Value::Str("10.0.0.9".into())
    );
}

#[tokio::test]
async fn removed_source_breaks_link_on_next_load() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("props.json");
    {
        let store = open_store(&path).await;
        store.link("report/host", "scanner/found").await.unwrap();
        store.stop().await.unwrap();
    }

    let file = JsonFile::open(&path, OpenOptions::default()).await.unwrap();
    let settings = StorageMapping::root(Arc::new(file));
    assert!(settings.contains("linked_to/report/host").await);
    let store = PropertyStore::new(PropertyTree::new(), settings.clone());
    store.add("", "report", PropertySpec::dict()).await.unwrap();
    store
        .add("report", "host", PropertySpec::input(DataType::String, ""))
        .await
        .unwrap();
    store.load().await.unwrap();
    assert!(!settings.contains("linked_to/report/host").await);
}
