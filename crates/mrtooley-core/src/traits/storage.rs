// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage backend trait for the key-value tree.

use async_trait::async_trait;

use crate::error::MrTooleyError;
use crate::traits::adapter::PluginAdapter;
use crate::value::{NodeEntry, NodeId, Value, ValueKind};

/// A backend holding a tree of mappings keyed by strings.
///
/// Backends only deal with single keys below a known mapping node. Path
/// resolution, recursive copies of nested mappings, and flushing after each
/// mutation are handled once, above this trait, by `StorageMapping` in
/// `mrtooley-storage`.
#[async_trait]
pub trait StorageBackend: PluginAdapter {
    /// Kinds stored as they are.
    fn native_types(&self) -> &'static [ValueKind];

    /// Kinds the backend transcodes into something it can store.
    fn extra_types(&self) -> &'static [ValueKind];

    /// Looks up a direct child of `parent`.
    async fn get_child(&self, parent: NodeId, key: &str)
    -> Result<Option<NodeEntry>, MrTooleyError>;

    /// Stores a scalar, replacing whatever was there (including a whole subtree).
    async fn set_value(&self, parent: NodeId, key: &str, value: Value)
    -> Result<(), MrTooleyError>;

    /// Creates an empty mapping, replacing whatever was there.
    async fn set_mapping(&self, parent: NodeId, key: &str) -> Result<NodeId, MrTooleyError>;

    /// Removes a child and its subtree. Returns false if the key did not exist.
    async fn remove_child(&self, parent: NodeId, key: &str) -> Result<bool, MrTooleyError>;

    /// Keys of all children, sorted ascending.
    async fn child_keys(&self, parent: NodeId) -> Result<Vec<String>, MrTooleyError>;

    /// Number of children.
    async fn child_count(&self, parent: NodeId) -> Result<usize, MrTooleyError>;

    /// Persists buffered state.
    async fn flush(&self) -> Result<(), MrTooleyError>;
}
