// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Name-to-opener registry for root storage backends.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::info;

use mrtooley_config::{MrTooleyConfig, expand_home};
use mrtooley_core::{MrTooleyError, StorageBackend};

use crate::fs::OpenOptions;
use crate::json::JsonFile;
use crate::sqlite::SqliteFile;

/// Opens a backend on a file path.
pub type BackendOpener =
    fn(PathBuf) -> BoxFuture<'static, Result<Arc<dyn StorageBackend>, MrTooleyError>>;

#[derive(Clone)]
struct BackendSpec {
    default_file: &'static str,
    open: BackendOpener,
}

/// Known storage backends, keyed by upper-case name.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, BackendSpec>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

fn open_json(path: PathBuf) -> BoxFuture<'static, Result<Arc<dyn StorageBackend>, MrTooleyError>> {
    async move {
        let file = JsonFile::open(&path, OpenOptions::create()).await?;
        Ok(Arc::new(file) as Arc<dyn StorageBackend>)
    }
    .boxed()
}

fn open_sqlite(path: PathBuf) -> BoxFuture<'static, Result<Arc<dyn StorageBackend>, MrTooleyError>> {
    async move {
        let db = SqliteFile::open(&path, OpenOptions::create()).await?;
        Ok(Arc::new(db) as Arc<dyn StorageBackend>)
    }
    .boxed()
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `JSON` and `SQLITE`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("JSON", "root_storage.json", open_json);
        registry.register("SQLITE", "root_storage.sqlite", open_sqlite);
        registry
    }

    pub fn register(&mut self, name: &str, default_file: &'static str, open: BackendOpener) {
        self.backends
            .insert(name.to_ascii_uppercase(), BackendSpec { default_file, open });
    }

    pub fn names(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(&name.trim().to_ascii_uppercase())
    }

    fn spec(&self, name: &str) -> Result<&BackendSpec, MrTooleyError> {
        self.backends
            .get(&name.trim().to_ascii_uppercase())
            .ok_or_else(|| MrTooleyError::Config(format!("unknown storage backend '{name}'")))
    }

    /// Where a backend's file lives: `arg` if given, else its default file
    /// inside `rootconfig_dir`.
    pub fn resolve_path(
        &self,
        name: &str,
        arg: &str,
        rootconfig_dir: &Path,
    ) -> Result<PathBuf, MrTooleyError> {
        let spec = self.spec(name)?;
        let arg = arg.trim();
        Ok(if arg.is_empty() {
            rootconfig_dir.join(spec.default_file)
        } else {
            expand_home(arg)
        })
    }

    /// Opens backend `name` on the file described by `arg`.
    pub async fn open_from_str_arg(
        &self,
        name: &str,
        arg: &str,
        rootconfig_dir: &Path,
    ) -> Result<Arc<dyn StorageBackend>, MrTooleyError> {
        let path = self.resolve_path(name, arg, rootconfig_dir)?;
        let open = self.spec(name)?.open;
        info!(backend = %name, path = %path.display(), "opening root storage");
        open(path).await
    }

    /// Opens the backend selected by `[storage]`.
    pub async fn open_from_config(
        &self,
        config: &MrTooleyConfig,
    ) -> Result<Arc<dyn StorageBackend>, MrTooleyError> {
        self.open_from_str_arg(
            &config.storage.backend,
            &config.storage.args,
            &config.paths.rootconfig_path(),
        )
        .await
    }
}
