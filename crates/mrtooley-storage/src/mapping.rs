// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Path-aware handle onto one mapping of a storage backend.
//!
//! Paths are keys joined with `/`. Reads walk the path from this mapping.
//! Writes resolve the parent of the last key; [`StorageMapping::set`] requires
//! it to exist while [`StorageMapping::set_deep`] creates it. Every mutation
//! flushes the backend before returning.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::trace;

use mrtooley_core::path::{self, PATH_SEP};
use mrtooley_core::{Item, MrTooleyError, NodeEntry, NodeId, StorageBackend, Value};

/// What a path points at.
#[derive(Debug, Clone)]
pub enum Entry {
    Value(Value),
    Mapping(StorageMapping),
}

impl Entry {
    pub fn is_mapping(&self) -> bool {
        matches!(self, Entry::Mapping(_))
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Entry::Value(v) => Some(v),
            Entry::Mapping(_) => None,
        }
    }

    pub fn into_mapping(self) -> Option<StorageMapping> {
        match self {
            Entry::Mapping(m) => Some(m),
            Entry::Value(_) => None,
        }
    }
}

/// Cheaply clonable handle: a shared backend plus the node this handle sits on.
#[derive(Clone)]
pub struct StorageMapping {
    backend: Arc<dyn StorageBackend>,
    node: NodeId,
}

impl fmt::Debug for StorageMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageMapping")
            .field("backend", &self.backend.name())
            .field("node", &self.node)
            .finish()
    }
}

impl StorageMapping {
    /// Handle on the backend's root mapping.
    pub fn root(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            node: NodeId::Root,
        }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    fn at(&self, node: NodeId) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            node,
        }
    }

    fn entry(&self, found: NodeEntry) -> Entry {
        match found {
            NodeEntry::Value(v) => Entry::Value(v),
            NodeEntry::Mapping(id) => Entry::Mapping(self.at(id)),
        }
    }

    /// Reads the entry at `path`.
    pub async fn get(&self, path: &str) -> Result<Entry, MrTooleyError> {
        path::validate_path(path)?;
        let mut current = self.clone();
        let mut segments = path.split(PATH_SEP).peekable();
        while let Some(segment) = segments.next() {
            let found = current
                .backend
                .get_child(current.node, segment)
                .await?
                .ok_or_else(|| MrTooleyError::key(path))?;
            if segments.peek().is_none() {
                return Ok(current.entry(found));
            }
            match found {
                NodeEntry::Mapping(id) => current = current.at(id),
                NodeEntry::Value(_) => {
                    return Err(MrTooleyError::MappingExpected {
                        path: path.to_string(),
                        segment: segment.to_string(),
                    });
                }
            }
        }
        Err(MrTooleyError::key(path))
    }

    /// Reads a scalar at `path`.
    pub async fn get_value(&self, path: &str) -> Result<Value, MrTooleyError> {
        match self.get(path).await? {
            Entry::Value(v) => Ok(v),
            Entry::Mapping(_) => Err(MrTooleyError::UnsupportedType(format!(
                "expected a value at '{path}', found a mapping"
            ))),
        }
    }

    /// Reads a scalar, or returns `default` when nothing is stored at `path`.
    pub async fn get_or(&self, path: &str, default: Value) -> Result<Value, MrTooleyError> {
        match self.get_value(path).await {
            Err(e) if e.is_missing_key() => Ok(default),
            other => other,
        }
    }

    /// Reads the mapping at `path`.
    pub async fn get_mapping(&self, path: &str) -> Result<StorageMapping, MrTooleyError> {
        match self.get(path).await? {
            Entry::Mapping(m) => Ok(m),
            Entry::Value(_) => {
                let (_, key) = path::split_last(path)?;
                Err(MrTooleyError::MappingExpected {
                    path: path.to_string(),
                    segment: key.to_string(),
                })
            }
        }
    }

    /// True if something is stored at `path`. Never fails.
    pub async fn contains(&self, path: &str) -> bool {
        self.get(path).await.is_ok()
    }

    /// Stores `item` at `path`. The parent mapping must already exist.
    pub async fn set(&self, path: &str, item: impl Into<Item>) -> Result<(), MrTooleyError> {
        let item = item.into();
        check_nested_keys(&item)?;
        let (parent, key) = self.resolve_parent(path, false).await?;
        parent.write(key, item).await?;
        self.backend.flush().await
    }

    /// Stores `item` at `path`, creating missing intermediate mappings.
    pub async fn set_deep(&self, path: &str, item: impl Into<Item>) -> Result<(), MrTooleyError> {
        let item = item.into();
        check_nested_keys(&item)?;
        let (parent, key) = self.resolve_parent(path, true).await?;
        parent.write(key, item).await?;
        self.backend.flush().await
    }

    /// Removes the entry at `path` and everything below it.
    pub async fn delete(&self, path: &str) -> Result<(), MrTooleyError> {
        let (parent, key) = self.resolve_parent(path, false).await?;
        if !self.backend.remove_child(parent.node, key).await? {
            return Err(MrTooleyError::key(path));
        }
        self.backend.flush().await
    }

    /// Returns the mapping stored under `key`, creating an empty one if absent.
    pub async fn ensure_mapping(&self, key: &str) -> Result<StorageMapping, MrTooleyError> {
        match self.get(key).await {
            Ok(Entry::Mapping(m)) => Ok(m),
            Ok(Entry::Value(_)) => Err(MrTooleyError::MappingExpected {
                path: key.to_string(),
                segment: key.to_string(),
            }),
            Err(e) if e.is_missing_key() => {
                let (parent, last) = self.resolve_parent(key, true).await?;
                let id = self.backend.set_mapping(parent.node, last).await?;
                self.backend.flush().await?;
                Ok(self.at(id))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn len(&self) -> Result<usize, MrTooleyError> {
        self.backend.child_count(self.node).await
    }

    pub async fn is_empty(&self) -> Result<bool, MrTooleyError> {
        Ok(self.len().await? == 0)
    }

    /// Direct child keys, sorted.
    pub async fn keys(&self) -> Result<Vec<String>, MrTooleyError> {
        self.backend.child_keys(self.node).await
    }

    /// Direct children with their entries, sorted by key.
    pub async fn items(&self) -> Result<Vec<(String, Entry)>, MrTooleyError> {
        let mut items = Vec::new();
        for key in self.keys().await? {
            if let Some(found) = self.backend.get_child(self.node, &key).await? {
                items.push((key, self.entry(found)));
            }
        }
        Ok(items)
    }

    /// Copies the whole subtree out of the backend.
    pub fn to_item(&self) -> BoxFuture<'_, Result<Item, MrTooleyError>> {
        async move {
            let mut out = BTreeMap::new();
            for (key, entry) in self.items().await? {
                let item = match entry {
                    Entry::Value(v) => Item::Value(v),
                    Entry::Mapping(m) => m.to_item().await?,
                };
                out.insert(key, item);
            }
            Ok(Item::Mapping(out))
        }
        .boxed()
    }

    pub async fn flush(&self) -> Result<(), MrTooleyError> {
        self.backend.flush().await
    }

    /// Walks to the parent mapping of the last key of `path`.
    async fn resolve_parent<'p>(
        &self,
        path: &'p str,
        create: bool,
    ) -> Result<(StorageMapping, &'p str), MrTooleyError> {
        let (parent, key) = path::split_last(path)?;
        let Some(parent) = parent else {
            return Ok((self.clone(), key));
        };

        let mut current = self.clone();
        for segment in parent.split(PATH_SEP) {
            current = match current.backend.get_child(current.node, segment).await? {
                Some(NodeEntry::Mapping(id)) => current.at(id),
                Some(NodeEntry::Value(_)) => {
                    return Err(MrTooleyError::MappingExpected {
                        path: path.to_string(),
                        segment: segment.to_string(),
                    });
                }
                None if create => {
                    trace!(segment, "creating intermediate mapping");
                    let id = current.backend.set_mapping(current.node, segment).await?;
                    current.at(id)
                }
                None => return Err(MrTooleyError::key(parent)),
            };
        }
        Ok((current, key))
    }

    /// Writes an item below this mapping without flushing.
    async fn write(&self, key: &str, item: Item) -> Result<(), MrTooleyError> {
        let mut pending = vec![(self.node, key.to_string(), item)];
        while let Some((node, key, item)) = pending.pop() {
            match item {
                Item::Value(value) => self.backend.set_value(node, &key, value).await?,
                Item::Mapping(children) => {
                    let id = self.backend.set_mapping(node, &key).await?;
                    for (child_key, child) in children {
                        pending.push((id, child_key, child));
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_nested_keys(item: &Item) -> Result<(), MrTooleyError> {
    if let Item::Mapping(children) = item {
        for (key, child) in children {
            path::validate_key(key)?;
            check_nested_keys(child)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JsonFile;

    fn mapping() -> StorageMapping {
        StorageMapping::root(Arc::new(JsonFile::in_memory()))
    }

    #[tokio::test]
    async fn set_requires_existing_parent() {
        let m = mapping();
        let err = m.set("missing/key", 1).await.unwrap_err();
        assert!(err.is_missing_key());

        m.set_deep("missing/key", 1).await.unwrap();
        assert_eq!(m.get_value("missing/key").await.unwrap(), Value::Int(1));
    }

    #[tokio::test]
    async fn walking_through_a_value_fails() {
        let m = mapping();
        m.set("scalar", "x").await.unwrap();
        let err = m.get("scalar/below").await.unwrap_err();
        assert!(
            matches!(err, MrTooleyError::MappingExpected { ref segment, .. } if segment == "scalar")
        );
        let err = m.set_deep("scalar/below", 1).await.unwrap_err();
        assert!(matches!(err, MrTooleyError::MappingExpected { .. }));
        assert!(!m.contains("scalar/below").await);
    }

    #[tokio::test]
    async fn invalid_paths_are_key_errors() {
        let m = mapping();
        for bad in ["", "a//b", "/a", "a/", "sp ace"] {
            assert!(m.get(bad).await.unwrap_err().is_missing_key(), "{bad}");
            assert!(m.set(bad, 1).await.is_err(), "{bad}");
        }
    }

    #[tokio::test]
    async fn nested_item_keys_are_validated() {
        let m = mapping();
        let err = m.set("d", Item::mapping([("bad key", 1)])).await.unwrap_err();
        assert!(err.is_missing_key());
        assert!(!m.contains("d").await);

        m.set("d", 1).await.unwrap();
        let deep = Item::mapping([("ok", Item::mapping([("also/bad", 2)]))]);
        assert!(m.set("d", deep).await.is_err());
        assert_eq!(m.get_value("d").await.unwrap(), Value::Int(1));

        assert!(m.set_deep("new/branch", deep_bad()).await.is_err());
        assert!(!m.contains("new").await);
    }

    fn deep_bad() -> Item {
        Item::mapping([("x", Item::mapping([("", 1)]))])
    }

    #[tokio::test]
    async fn ensure_mapping_is_idempotent() {
        let m = mapping();
        let tools = m.ensure_mapping("tools").await.unwrap();
        tools.set("nmap", 1).await.unwrap();
        let again = m.ensure_mapping("tools").await.unwrap();
        assert_eq!(again.keys().await.unwrap(), vec!["nmap".to_string()]);

        m.set("flat", 1).await.unwrap();
        assert!(m.ensure_mapping("flat").await.is_err());
    }

    #[tokio::test]
    async fn to_item_copies_subtree() {
        let m = mapping();
        let item = Item::mapping([("a", Item::mapping([("b", 2)])), ("c", Item::from("x"))]);
        m.set("tree", item.clone()).await.unwrap();
        let copy = m.get_mapping("tree").await.unwrap().to_item().await.unwrap();
        assert_eq!(copy, item);
    }
}
