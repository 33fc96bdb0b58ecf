// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named, mountable storage spaces.
//!
//! Every workspace is a mapping under the `workspaces` root with two children:
//! `data` holds the user's values and `mounts` maps a mount key to the name
//! of another workspace. Addresses look like `@name/path`; `@/path` uses the
//! default workspace. A first path segment that is a mount key continues the
//! lookup inside the mounted workspace.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use mrtooley_core::path::{self, PATH_SEP};
use mrtooley_core::{Item, MrTooleyError, Value};

use crate::mapping::{Entry, StorageMapping};

pub const DEFAULT_WORKSPACE: &str = "default";
const DATA_KEY: &str = "data";
const MOUNTS_KEY: &str = "mounts";
/// Upper bound on mount hops during resolution.
const MAX_MOUNT_DEPTH: usize = 32;

/// One opened workspace.
#[derive(Debug, Clone)]
pub struct Workspace {
    name: String,
    mapping: StorageMapping,
}

impl Workspace {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The workspace's own values.
    pub async fn data(&self) -> Result<StorageMapping, MrTooleyError> {
        self.mapping.ensure_mapping(DATA_KEY).await
    }

    /// Mount key to target workspace name.
    pub async fn mounts(&self) -> Result<BTreeMap<String, String>, MrTooleyError> {
        let mounts = self.mapping.ensure_mapping(MOUNTS_KEY).await?;
        let mut out = BTreeMap::new();
        for (key, entry) in mounts.items().await? {
            if let Entry::Value(Value::Str(target)) = entry {
                out.insert(key, target);
            }
        }
        Ok(out)
    }
}

/// Creates, lists, mounts and resolves workspaces.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: StorageMapping,
}

impl WorkspaceManager {
    /// `root` is the `workspaces` mapping of the root storage.
    pub fn new(root: StorageMapping) -> Self {
        Self { root }
    }

    pub async fn list(&self) -> Result<Vec<String>, MrTooleyError> {
        self.root.keys().await
    }

    pub async fn exists(&self, name: &str) -> bool {
        path::is_valid_key(name) && self.root.contains(name).await
    }

    pub async fn create(&self, name: &str) -> Result<Workspace, MrTooleyError> {
        path::validate_key(name)?;
        if self.root.contains(name).await {
            return Err(MrTooleyError::Config(format!(
                "workspace '{name}' already exists"
            )));
        }
        self.root
            .set(
                name,
                Item::mapping([
                    (DATA_KEY, Item::empty_mapping()),
                    (MOUNTS_KEY, Item::empty_mapping()),
                ]),
            )
            .await?;
        info!(workspace = %name, "created workspace");
        self.open(name).await
    }

    pub async fn open(&self, name: &str) -> Result<Workspace, MrTooleyError> {
        path::validate_key(name)?;
        let mapping = match self.root.get(name).await {
            Ok(Entry::Mapping(m)) => m,
            Ok(Entry::Value(_)) => {
                return Err(MrTooleyError::MappingExpected {
                    path: name.to_string(),
                    segment: name.to_string(),
                });
            }
            Err(e) if e.is_missing_key() => {
                return Err(MrTooleyError::key(format!("workspace '{name}' not found")));
            }
            Err(e) => return Err(e),
        };
        Ok(Workspace {
            name: name.to_string(),
            mapping,
        })
    }

    /// Opens the default workspace, creating it on first use.
    pub async fn open_default(&self) -> Result<Workspace, MrTooleyError> {
        if self.root.contains(DEFAULT_WORKSPACE).await {
            self.open(DEFAULT_WORKSPACE).await
        } else {
            self.create(DEFAULT_WORKSPACE).await
        }
    }

    /// Removes a workspace and every mount that points at it.
    pub async fn remove(&self, name: &str) -> Result<(), MrTooleyError> {
        self.open(name).await?;
        self.root.delete(name).await?;
        for other in self.list().await? {
            let ws = self.open(&other).await?;
            for (key, target) in ws.mounts().await? {
                if target == name {
                    debug!(workspace = %other, mount = %key, "dropping dangling mount");
                    self.unmount(&other, &key).await?;
                }
            }
        }
        info!(workspace = %name, "removed workspace");
        Ok(())
    }

    /// Mounts workspace `target` at `key` inside `name`.
    pub async fn mount(&self, name: &str, key: &str, target: &str) -> Result<(), MrTooleyError> {
        path::validate_key(key)?;
        let ws = self.open(name).await?;
        self.open(target).await?;
        if self.reachable(target).await?.contains(name) {
            return Err(MrTooleyError::Config(format!(
                "mounting '{target}' into '{name}' would create a cycle"
            )));
        }
        let mounts = ws.mapping.ensure_mapping(MOUNTS_KEY).await?;
        mounts.set(key, target).await
    }

    pub async fn unmount(&self, name: &str, key: &str) -> Result<(), MrTooleyError> {
        let ws = self.open(name).await?;
        let mounts = ws.mapping.ensure_mapping(MOUNTS_KEY).await?;
        mounts.delete(key).await
    }

    /// Every workspace reachable from `start` through mounts, `start` included.
    async fn reachable(&self, start: &str) -> Result<BTreeSet<String>, MrTooleyError> {
        let mut seen = BTreeSet::new();
        let mut pending = vec![start.to_string()];
        while let Some(name) = pending.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Ok(ws) = self.open(&name).await {
                pending.extend(ws.mounts().await?.into_values());
            }
        }
        Ok(seen)
    }

    /// Resolves `@name/path` to the mapping holding the value and the
    /// remaining path inside it.
    pub async fn resolve(&self, address: &str) -> Result<(StorageMapping, String), MrTooleyError> {
        let (name, mut rest) = split_address(address)?;
        let mut ws = if name.is_empty() {
            self.open_default().await?
        } else {
            self.open(name).await?
        };

        for _ in 0..MAX_MOUNT_DEPTH {
            let (first, tail) = path::split_first(&rest)?;
            let mounts = ws.mounts().await?;
            let Some(target) = mounts.get(first) else {
                return Ok((ws.data().await?, rest));
            };
            let Some(tail) = tail else {
                return Err(MrTooleyError::key(format!(
                    "'{address}' names a mount point, not a value"
                )));
            };
            let tail = tail.to_string();
            ws = self.open(target).await?;
            rest = tail;
        }
        Err(MrTooleyError::Config(format!(
            "'{address}' crosses more than {MAX_MOUNT_DEPTH} mounts"
        )))
    }
}

fn split_address(address: &str) -> Result<(&str, String), MrTooleyError> {
    let body = address.strip_prefix('@').ok_or_else(|| {
        MrTooleyError::Parse(format!("workspace address must start with '@': {address}"))
    })?;
    let (name, rest) = body.split_once(PATH_SEP).ok_or_else(|| {
        MrTooleyError::Parse(format!("workspace address has no path: {address}"))
    })?;
    path::validate_path(rest)?;
    Ok((name, rest.to_string()))
}

/// Splits `@ws/path/key=value` into the address and the raw value.
pub fn parse_assignment(assignment: &str) -> Result<(&str, &str), MrTooleyError> {
    let (address, value) = assignment.split_once('=').ok_or_else(|| {
        MrTooleyError::Parse(format!("expected ADDRESS=VALUE, got '{assignment}'"))
    })?;
    if !address.starts_with('@') {
        return Err(MrTooleyError::Parse(format!(
            "workspace address must start with '@': {address}"
        )));
    }
    Ok((address, value))
}

/// Reads a command-line value: `null`, booleans, integers, floats, `0x` hex
/// bytes, or else a string.
pub fn parse_cli_value(raw: &str) -> Value {
    match raw {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Some(digits) = raw.strip_prefix("0x")
        && let Ok(bytes) = hex::decode(digits)
    {
        return Value::Bytes(bytes);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if raw.bytes().any(|b| b.is_ascii_digit())
        && let Ok(f) = raw.parse::<f64>()
    {
        return Value::Float(f);
    }
    Value::Str(raw.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::JsonFile;

    async fn manager() -> WorkspaceManager {
        let root = StorageMapping::root(Arc::new(JsonFile::in_memory()));
        WorkspaceManager::new(root.ensure_mapping("workspaces").await.unwrap())
    }

    #[tokio::test]
    async fn create_list_remove() {
        let m = manager().await;
        m.create("lab").await.unwrap();
        m.create("home").await.unwrap();
        assert_eq!(m.list().await.unwrap(), vec!["home", "lab"]);
        assert!(m.create("lab").await.is_err());
        assert!(m.create("bad name").await.is_err());

        m.remove("lab").await.unwrap();
        assert_eq!(m.list().await.unwrap(), vec!["home"]);
        assert!(m.remove("lab").await.unwrap_err().is_missing_key());
    }

    #[tokio::test]
    async fn resolve_through_mounts() {
        let m = manager().await;
        m.create("lab").await.unwrap();
        m.create("shared").await.unwrap();
        m.mount("lab", "common", "shared").await.unwrap();

        let (mapping, rest) = m.resolve("@lab/common/hosts/gw").await.unwrap();
        assert_eq!(rest, "hosts/gw");
        mapping.set_deep(&rest, "10.0.0.1").await.unwrap();

        let shared = m.open("shared").await.unwrap().data().await.unwrap();
        assert_eq!(
            shared.get_value("hosts/gw").await.unwrap(),
            Value::Str("10.0.0.1".into())
        );

        let (mapping, rest) = m.resolve("@lab/local").await.unwrap();
        assert_eq!(rest, "local");
        assert_eq!(mapping.node(), m.open("lab").await.unwrap().data().await.unwrap().node());

        assert!(m.resolve("@lab/common").await.is_err());
    }

    #[tokio::test]
    async fn default_workspace_is_created_on_demand() {
        let m = manager().await;
        let (mapping, rest) = m.resolve("@/notes").await.unwrap();
        mapping.set(&rest, "hi").await.unwrap();
        assert_eq!(m.list().await.unwrap(), vec![DEFAULT_WORKSPACE]);
    }

    #[tokio::test]
    async fn mount_cycles_are_rejected() {
        let m = manager().await;
        for name in ["a", "b", "c"] {
            m.create(name).await.unwrap();
        }
        m.mount("a", "to_b", "b").await.unwrap();
        m.mount("b", "to_c", "c").await.unwrap();
        assert!(m.mount("c", "to_a", "a").await.is_err());
        assert!(m.mount("a", "self", "a").await.is_err());
        assert!(m.mount("a", "ghost", "missing").await.is_err());
    }

    #[tokio::test]
    async fn removing_a_target_drops_its_mounts() {
        let m = manager().await;
        m.create("a").await.unwrap();
        m.create("b").await.unwrap();
        m.mount("a", "to_b", "b").await.unwrap();
        m.remove("b").await.unwrap();
        assert!(m.open("a").await.unwrap().mounts().await.unwrap().is_empty());
        assert!(m.unmount("a", "to_b").await.is_err());
    }

    #[test]
    fn addresses_and_assignments() {
        assert_eq!(
            parse_assignment("@ws/a/b=x=y").unwrap(),
            ("@ws/a/b", "x=y")
        );
        assert!(parse_assignment("ws/a=1").is_err());
        assert!(parse_assignment("@ws/a").is_err());
        assert!(split_address("@ws").is_err());
        assert!(split_address("@ws/a//b").is_err());
    }

    #[test]
    fn cli_values() {
        assert_eq!(parse_cli_value("null"), Value::Null);
        assert_eq!(parse_cli_value("true"), Value::Bool(true));
        assert_eq!(parse_cli_value("-12"), Value::Int(-12));
        assert_eq!(parse_cli_value("1.5"), Value::Float(1.5));
        assert_eq!(parse_cli_value("0xff00"), Value::Bytes(vec![0xff, 0]));
        assert_eq!(parse_cli_value("0xzz"), Value::Str("0xzz".into()));
        assert_eq!(parse_cli_value("inf"), Value::Str("inf".into()));
        assert_eq!(parse_cli_value("hello"), Value::Str("hello".into()));
    }
}
