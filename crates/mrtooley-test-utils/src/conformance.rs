// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared storage backend conformance scenario.

use mrtooley_core::{Item, Value};
use mrtooley_storage::{Entry, StorageMapping};

/// Runs the conformance scenario against an empty root mapping.
///
/// Panics on the first deviation, so call it from a test.
pub async fn storage_conformance(root: &StorageMapping) {
    root.set("key1", "value1").await.unwrap();
    root.set("key2", "value2").await.unwrap();
    root.set("int", 42).await.unwrap();
    root.set("float", 42.42).await.unwrap();
    root.set("bytes", b"bytes!".as_slice()).await.unwrap();

    assert_eq!(root.get_value("key1").await.unwrap(), Value::from("value1"));
    assert_eq!(root.get_value("key2").await.unwrap(), Value::from("value2"));
    assert_eq!(root.get_value("int").await.unwrap(), Value::Int(42));
    assert_eq!(root.get_value("float").await.unwrap(), Value::Float(42.42));
    assert_eq!(
        root.get_value("bytes").await.unwrap(),
        Value::Bytes(b"bytes!".to_vec())
    );

    assert_eq!(root.len().await.unwrap(), 5);

    assert!(root.contains("key1").await);
    root.delete("key1").await.unwrap();
    assert_eq!(root.len().await.unwrap(), 4);
    assert!(!root.contains("key1").await);

    assert_eq!(
        root.get_or("key1", Value::from("default")).await.unwrap(),
        Value::from("default")
    );
    assert_eq!(
        root.get_or("key2", Value::from("default")).await.unwrap(),
        Value::from("value2")
    );

    root.set("paths", Item::mapping([("sub1", 1), ("sub2", 2)]))
        .await
        .unwrap();
    let paths = match root.get("paths").await.unwrap() {
        Entry::Mapping(m) => m,
        Entry::Value(v) => panic!("expected a mapping at 'paths', got {v:?}"),
    };
    assert_eq!(paths.get_value("sub1").await.unwrap(), Value::Int(1));
    assert_eq!(paths.get_value("sub2").await.unwrap(), Value::Int(2));

    paths
        .set(
            "a",
            Item::mapping([(
                "very",
                Item::mapping([("deep", Item::mapping([("path", b"hello world".as_slice())]))]),
            )]),
        )
        .await
        .unwrap();
    assert_eq!(
        root.get_value("paths/a/very/deep/path").await.unwrap(),
        Value::Bytes(b"hello world".to_vec())
    );

    root.set("replacing", "string").await.unwrap();
    assert_eq!(root.get_value("replacing").await.unwrap(), Value::from("string"));

    root.set("replacing", Item::mapping([("sub1", 123), ("sub2", 456)]))
        .await
        .unwrap();
    assert!(root.get("replacing").await.unwrap().is_mapping());
    assert_eq!(root.get_value("replacing/sub1").await.unwrap(), Value::Int(123));
    assert_eq!(root.get_value("replacing/sub2").await.unwrap(), Value::Int(456));

    root.set("replacing", "replaced by string").await.unwrap();
    assert_eq!(
        root.get_value("replacing").await.unwrap(),
        Value::from("replaced by string")
    );
    assert!(!root.contains("replacing/sub1").await);
}
