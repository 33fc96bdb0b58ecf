// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON file backend.
//!
//! The whole tree lives in memory and is written out on flush, indented with
//! four spaces. Bytes and custom objects use the tags from [`crate::codec`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value as Json};
use tokio::sync::Mutex;
use tracing::debug;

use mrtooley_core::{
    AdapterType, HealthStatus, MrTooleyError, NodeEntry, NodeId, PluginAdapter, Serializer,
    StorageBackend, Value, ValueKind,
};

use crate::codec::{self, Decoded};
use crate::fs::{OpenOptions, prepare_file};

const ROOT: i64 = 0;

#[derive(Debug, Clone)]
enum Slot {
    Value(Value),
    Mapping(i64),
}

/// Arena of mappings keyed by internal id. Id 0 is the root.
#[derive(Debug)]
struct Tree {
    nodes: HashMap<i64, BTreeMap<String, Slot>>,
    next_id: i64,
    dirty: bool,
}

impl Tree {
    fn new() -> Self {
        Self {
            nodes: HashMap::from([(ROOT, BTreeMap::new())]),
            next_id: ROOT + 1,
            dirty: false,
        }
    }

    fn node_index(node: NodeId) -> i64 {
        match node {
            NodeId::Root => ROOT,
            NodeId::Id(id) => id,
        }
    }

    fn children(&self, node: NodeId) -> Result<&BTreeMap<String, Slot>, MrTooleyError> {
        self.nodes
            .get(&Self::node_index(node))
            .ok_or_else(|| stale(node))
    }

    fn children_mut(&mut self, node: NodeId) -> Result<&mut BTreeMap<String, Slot>, MrTooleyError> {
        self.nodes
            .get_mut(&Self::node_index(node))
            .ok_or_else(|| stale(node))
    }

    fn new_mapping(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, BTreeMap::new());
        id
    }

    /// Drops a mapping and every mapping below it.
    fn drop_subtree(&mut self, id: i64) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if let Some(children) = self.nodes.remove(&id) {
                pending.extend(children.into_values().filter_map(|slot| match slot {
                    Slot::Mapping(child) => Some(child),
                    Slot::Value(_) => None,
                }));
            }
        }
    }

    /// Stores a slot, dropping a replaced subtree.
    fn put(&mut self, node: NodeId, key: &str, slot: Slot) -> Result<(), MrTooleyError> {
        let previous = self.children_mut(node)?.insert(key.to_string(), slot);
        if let Some(Slot::Mapping(old)) = previous {
            self.drop_subtree(old);
        }
        self.dirty = true;
        Ok(())
    }

    fn load(&mut self, id: i64, map: Map<String, Json>, serializer: &Serializer) -> Result<(), MrTooleyError> {
        for (key, json) in map {
            let slot = match codec::decode_node(json, serializer)? {
                Decoded::Value(v) => Slot::Value(v),
                Decoded::Mapping(child) => {
                    let child_id = self.new_mapping();
                    self.load(child_id, child, serializer)?;
                    Slot::Mapping(child_id)
                }
            };
            self.nodes
                .get_mut(&id)
                .ok_or_else(|| MrTooleyError::Internal(format!("missing node {id}")))?
                .insert(key, slot);
        }
        Ok(())
    }

    fn dump(&self, id: i64) -> Result<Json, MrTooleyError> {
        let mut map = Map::new();
        if let Some(children) = self.nodes.get(&id) {
            for (key, slot) in children {
                let json = match slot {
                    Slot::Value(v) => codec::encode_value(v)?,
                    Slot::Mapping(child) => self.dump(*child)?,
                };
                map.insert(key.clone(), json);
            }
        }
        Ok(Json::Object(map))
    }
}

fn stale(node: NodeId) -> MrTooleyError {
    MrTooleyError::key(format!("stale mapping handle {node:?}"))
}

/// Storage backend keeping the tree in a single JSON document.
#[derive(Debug)]
pub struct JsonFile {
    path: Option<PathBuf>,
    tree: Mutex<Tree>,
    serializer: Serializer,
}

impl JsonFile {
    /// A tree that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            tree: Mutex::new(Tree::new()),
            serializer: Serializer::with_builtin(),
        }
    }

    /// Opens (or creates, per `options`) the JSON file at `path`.
    pub async fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self, MrTooleyError> {
        Self::open_with(path, options, Serializer::with_builtin()).await
    }

    /// Like [`JsonFile::open`] with a custom datatype registry.
    pub async fn open_with(
        path: impl AsRef<Path>,
        options: OpenOptions,
        serializer: Serializer,
    ) -> Result<Self, MrTooleyError> {
        let path = path.as_ref().to_path_buf();
        let existed = prepare_file(&path, options, "JSON").await?;

        let mut tree = Tree::new();
        if existed {
            let text = tokio::fs::read_to_string(&path).await?;
            if !text.trim().is_empty() {
                let json: Json = serde_json::from_str(&text).map_err(MrTooleyError::storage)?;
                let Json::Object(map) = json else {
                    return Err(MrTooleyError::storage(format!(
                        "{}: top level is not a JSON object",
                        path.display()
                    )));
                };
                tree.load(ROOT, map, &serializer)?;
            }
        } else {
            tree.dirty = true;
        }
        debug!(path = %path.display(), existed, "opened JSON storage");

        let file = Self {
            path: Some(path),
            tree: Mutex::new(tree),
            serializer,
        };
        file.flush().await?;
        Ok(file)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn check(&self, value: &Value) -> Result<(), MrTooleyError> {
        match value {
            Value::Object(obj) => self.serializer.check(obj),
            Value::Float(f) => codec::encode_float(*f).map(drop),
            Value::List(items) => items.iter().try_for_each(|v| self.check(v)),
            _ => Ok(()),
        }
    }
}

fn render(json: &Json) -> Result<Vec<u8>, MrTooleyError> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    json.serialize(&mut ser).map_err(MrTooleyError::storage)?;
    out.push(b'\n');
    Ok(out)
}

#[async_trait]
impl PluginAdapter for JsonFile {
    fn name(&self) -> &str {
        "json"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, MrTooleyError> {
        match &self.path {
            Some(path) if !path.exists() => Ok(HealthStatus::Degraded(format!(
                "{} disappeared",
                path.display()
            ))),
            _ => Ok(HealthStatus::Healthy),
        }
    }

    async fn shutdown(&self) -> Result<(), MrTooleyError> {
        self.flush().await
    }
}

#[async_trait]
impl StorageBackend for JsonFile {
    fn native_types(&self) -> &'static [ValueKind] {
        &[
            ValueKind::Null,
            ValueKind::Bool,
            ValueKind::Int,
            ValueKind::Float,
            ValueKind::Str,
            ValueKind::List,
            ValueKind::Mapping,
        ]
    }

    fn extra_types(&self) -> &'static [ValueKind] {
        &[ValueKind::Bytes, ValueKind::Object]
    }

    async fn get_child(&self, parent: NodeId, key: &str) -> Result<Option<NodeEntry>, MrTooleyError> {
        let tree = self.tree.lock().await;
        Ok(tree.children(parent)?.get(key).map(|slot| match slot {
            Slot::Value(v) => NodeEntry::Value(v.clone()),
            Slot::Mapping(id) => NodeEntry::Mapping(NodeId::Id(*id)),
        }))
    }

    async fn set_value(&self, parent: NodeId, key: &str, value: Value) -> Result<(), MrTooleyError> {
        self.check(&value)?;
        self.tree.lock().await.put(parent, key, Slot::Value(value))
    }

    async fn set_mapping(&self, parent: NodeId, key: &str) -> Result<NodeId, MrTooleyError> {
        let mut tree = self.tree.lock().await;
        tree.children(parent)?;
        let id = tree.new_mapping();
        tree.put(parent, key, Slot::Mapping(id))?;
        Ok(NodeId::Id(id))
    }

    async fn remove_child(&self, parent: NodeId, key: &str) -> Result<bool, MrTooleyError> {
        let mut tree = self.tree.lock().await;
        match tree.children_mut(parent)?.remove(key) {
            None => Ok(false),
            Some(slot) => {
                if let Slot::Mapping(id) = slot {
                    tree.drop_subtree(id);
                }
                tree.dirty = true;
                Ok(true)
            }
        }
    }

    async fn child_keys(&self, parent: NodeId) -> Result<Vec<String>, MrTooleyError> {
        let tree = self.tree.lock().await;
        Ok(tree.children(parent)?.keys().cloned().collect())
    }

    async fn child_count(&self, parent: NodeId) -> Result<usize, MrTooleyError> {
        Ok(self.tree.lock().await.children(parent)?.len())
    }

    async fn flush(&self) -> Result<(), MrTooleyError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut tree = self.tree.lock().await;
        if !tree.dirty {
            return Ok(());
        }
        let bytes = render(&tree.dump(ROOT)?)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        tree.dirty = false;
        debug!(path = %path.display(), bytes = bytes.len(), "flushed JSON storage");
        Ok(())
    }
}
