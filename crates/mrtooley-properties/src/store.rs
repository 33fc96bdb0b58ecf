// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence and background polling for a [`PropertyTree`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use mrtooley_core::{MrTooleyError, Value};
use mrtooley_storage::StorageMapping;

use crate::tree::{
    FLOAT_PREC_NS, INTERVAL_NS, LINK_NS, PropertyTree, SettingOp, StoredSettings, VALUES_NS,
    setting_key,
};
use crate::types::{PropertyId, PropertySpec};

/// Default worker tick.
pub const DEFAULT_WORKER_PERIOD: Duration = Duration::from_millis(100);

struct Worker {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// A property tree bound to a settings mapping.
pub struct PropertyStore {
    tree: Arc<Mutex<PropertyTree>>,
    settings: StorageMapping,
    worker: Mutex<Option<Worker>>,
}

impl std::fmt::Debug for PropertyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyStore")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

async fn read_optional(
    settings: &StorageMapping,
    namespace: &str,
    path: &str,
) -> Result<Option<Value>, MrTooleyError> {
    match settings.get_value(&setting_key(namespace, path)).await {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_missing_key() => Ok(None),
        Err(e) => Err(e),
    }
}

impl PropertyStore {
    pub fn new(tree: PropertyTree, settings: StorageMapping) -> Self {
        Self {
            tree: Arc::new(Mutex::new(tree)),
            settings,
            worker: Mutex::new(None),
        }
    }

    /// Shared handle on the tree. Writes made through it bypass the
    /// settings queue until the next store call drains it.
    pub fn tree(&self) -> Arc<Mutex<PropertyTree>> {
        self.tree.clone()
    }

    pub fn settings(&self) -> &StorageMapping {
        &self.settings
    }

    async fn read_settings(
        &self,
        tree: &PropertyTree,
        id: PropertyId,
        path: &str,
    ) -> Result<StoredSettings, MrTooleyError> {
        let mut stored = StoredSettings {
            value: read_optional(&self.settings, VALUES_NS, path).await?,
            link: None,
            interval: read_optional(&self.settings, INTERVAL_NS, path).await?,
            float_precision: None,
        };
        if let Some(link) = read_optional(&self.settings, LINK_NS, path).await? {
            match link {
                Value::Str(source) => stored.link = Some(source),
                other => warn!(path, value = ?other, "ignoring malformed link setting"),
            }
        }
        if tree.needs_float_precision(id) {
            stored.float_precision = read_optional(&self.settings, FLOAT_PREC_NS, path).await?;
        }
        Ok(stored)
    }

    async fn apply_ops(&self, ops: Vec<SettingOp>) -> Result<(), MrTooleyError> {
        for op in ops {
            match op {
                SettingOp::Set(key, value) => self.settings.set_deep(&key, value).await?,
                SettingOp::Delete(key) => match self.settings.delete(&key).await {
                    Ok(()) => {}
                    Err(e) if e.is_missing_key() => {}
                    Err(e) => return Err(e),
                },
            }
        }
        Ok(())
    }

    async fn drain(&self, tree: &mut PropertyTree) -> Result<(), MrTooleyError> {
        let ops = tree.take_ops();
        self.apply_ops(ops).await
    }

    async fn load_pending(&self, tree: &mut PropertyTree) -> Result<usize, MrTooleyError> {
        let pending = tree.unloaded();
        for (id, path) in &pending {
            let stored = self.read_settings(tree, *id, path).await?;
            tree.apply_loaded(*id, stored)?;
        }
        Ok(pending.len())
    }

    /// Reads values, links, intervals and precisions for every property,
    /// then resolves links.
    pub async fn load(&self) -> Result<(), MrTooleyError> {
        let mut tree = self.tree.lock().await;
        let count = self.load_pending(&mut tree).await?;
        tree.mark_loaded();
        let broken = tree.resolve_links(Instant::now());
        self.drain(&mut tree).await?;
        info!(count, broken_links = broken, "properties loaded");
        Ok(())
    }

    /// Resolves links read during load. Returns how many were dropped.
    pub async fn create_links(&self) -> Result<usize, MrTooleyError> {
        let mut tree = self.tree.lock().await;
        let broken = tree.resolve_links(Instant::now());
        self.drain(&mut tree).await?;
        Ok(broken)
    }

    /// Adds a property. Once the tree is loaded the new property is loaded
    /// right away.
    pub async fn add(
        &self,
        parent: &str,
        key: &str,
        spec: PropertySpec,
    ) -> Result<PropertyId, MrTooleyError> {
        let mut tree = self.tree.lock().await;
        let id = tree.add(parent, key, spec)?;
        if tree.is_loaded() {
            self.load_pending(&mut tree).await?;
            tree.resolve_links(Instant::now());
            self.drain(&mut tree).await?;
        }
        Ok(id)
    }

    pub async fn remove(&self, path: &str) -> Result<(), MrTooleyError> {
        self.tree.lock().await.remove(path)
    }

    pub async fn set_value(&self, path: &str, value: impl Into<Value>) -> Result<(), MrTooleyError> {
        let mut tree = self.tree.lock().await;
        tree.set_value(path, value.into(), Instant::now())?;
        self.drain(&mut tree).await
    }

    pub async fn set_output(&self, path: &str, value: impl Into<Value>) -> Result<(), MrTooleyError> {
        let mut tree = self.tree.lock().await;
        tree.set_output(path, value.into(), Instant::now())?;
        self.drain(&mut tree).await
    }

    pub async fn read(&self, path: &str) -> Result<Value, MrTooleyError> {
        self.tree.lock().await.read(path, Instant::now())
    }

    pub async fn link(&self, a: &str, b: &str) -> Result<(), MrTooleyError> {
        let mut tree = self.tree.lock().await;
        tree.link(a, b, Instant::now())?;
        self.drain(&mut tree).await
    }

    pub async fn unlink(&self, path: &str) -> Result<(), MrTooleyError> {
        let mut tree = self.tree.lock().await;
        tree.unlink(path)?;
        self.drain(&mut tree).await
    }

    pub async fn set_poll_interval(
        &self,
        path: &str,
        interval: Option<Duration>,
    ) -> Result<(), MrTooleyError> {
        let mut tree = self.tree.lock().await;
        tree.set_poll_interval(path, interval)?;
        self.drain(&mut tree).await
    }

    pub async fn set_float_precision(&self, path: &str, digits: u32) -> Result<(), MrTooleyError> {
        let mut tree = self.tree.lock().await;
        tree.set_float_precision(path, digits)?;
        self.drain(&mut tree).await
    }

    async fn write_values(&self, entries: Vec<(String, Value)>) -> Result<usize, MrTooleyError> {
        let count = entries.len();
        for (key, value) in entries {
            self.settings.set_deep(&key, value).await?;
        }
        if count > 0 {
            debug!(count, "saved property values");
        }
        Ok(count)
    }

    /// Writes values whose save deadline is at or before `now`.
    pub async fn save_due(&self, now: Instant) -> Result<usize, MrTooleyError> {
        let mut tree = self.tree.lock().await;
        let due = tree.take_due_saves(now);
        self.drain(&mut tree).await?;
        self.write_values(due).await
    }

    /// Writes every pending value now.
    pub async fn save_all(&self) -> Result<usize, MrTooleyError> {
        let mut tree = self.tree.lock().await;
        let all = tree.take_all_saves();
        self.drain(&mut tree).await?;
        self.write_values(all).await
    }

    async fn tick(&self) -> Result<(), MrTooleyError> {
        let now = Instant::now();
        {
            let mut tree = self.tree.lock().await;
            tree.poll_next(now);
            self.drain(&mut tree).await?;
        }
        self.save_due(now).await?;
        Ok(())
    }

    /// Starts the background task: each tick polls one function and saves
    /// due values. A running worker is left alone.
    pub async fn spawn_worker(self: &Arc<Self>, period: Duration) {
        let mut slot = self.worker.lock().await;
        if slot.is_some() {
            return;
        }
        let (stop, mut stopped) = watch::channel(false);
        let store = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = store.tick().await {
                            warn!(error = %e, "property worker tick failed");
                        }
                    }
                    _ = stopped.changed() => break,
                }
            }
            debug!("property worker stopped");
        });
        *slot = Some(Worker { stop, handle });
    }

    /// Stops the worker, if any, and saves everything still pending.
    pub async fn stop(&self) -> Result<(), MrTooleyError> {
        if let Some(worker) = self.worker.lock().await.take() {
            let _ = worker.stop.send(true);
            if let Err(e) = worker.handle.await {
                warn!(error = %e, "property worker ended abnormally");
            }
        }
        self.save_all().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use mrtooley_storage::JsonFile;

    use super::*;
    use crate::types::DataType;

    fn settings() -> StorageMapping {
        StorageMapping::root(Arc::new(JsonFile::in_memory()))
    }

    #[tokio::test]
    async fn load_reads_stored_values() {
        let settings = settings();
        settings.set_deep("values/dev/gain", 2.5).await.unwrap();
        let store = PropertyStore::new(PropertyTree::new(), settings);
        store.add("", "dev", PropertySpec::dict()).await.unwrap();
        store
            .add("dev", "gain", PropertySpec::input(DataType::Float, 1.0))
            .await
            .unwrap();
        store
            .add("dev", "count", PropertySpec::input(DataType::Integer, 7))
            .await
            .unwrap();
        store.load().await.unwrap();
        assert_eq!(store.read("dev/gain").await.unwrap(), Value::Float(2.5));
        assert_eq!(store.read("dev/count").await.unwrap(), Value::Int(7));
    }

    #[tokio::test]
    async fn late_add_loads_immediately() {
        let settings = settings();
        settings.set_deep("values/late", 9).await.unwrap();
        let store = PropertyStore::new(PropertyTree::new(), settings);
        store.load().await.unwrap();
        store
            .add("", "late", PropertySpec::input(DataType::Integer, 0))
            .await
            .unwrap();
        assert_eq!(store.read("late").await.unwrap(), Value::Int(9));
        store.set_value("late", 10).await.unwrap();
        assert_eq!(store.read("late").await.unwrap(), Value::Int(10));
    }

    #[tokio::test]
    async fn link_settings_are_persisted_and_removed() {
        let store = PropertyStore::new(PropertyTree::new(), settings());
        store
            .add("", "src", PropertySpec::output(DataType::Integer, 1))
            .await
            .unwrap();
        store
            .add("", "dst", PropertySpec::input(DataType::Integer, 0))
            .await
            .unwrap();
        store.load().await.unwrap();
        store.link("src", "dst").await.unwrap();
        assert_eq!(
            store.settings().get_value("linked_to/dst").await.unwrap(),
            Value::Str("src".into())
        );
        store.unlink("dst").await.unwrap();
        assert!(!store.settings().contains("linked_to/dst").await);
    }

    #[tokio::test]
    async fn broken_link_setting_is_deleted() {
        let settings = settings();
        settings.set_deep("linked_to/dst", "nowhere").await.unwrap();
        let store = PropertyStore::new(PropertyTree::new(), settings);
        store
            .add("", "dst", PropertySpec::input(DataType::Integer, 0))
            .await
            .unwrap();
        store.load().await.unwrap();
        assert!(!store.settings().contains("linked_to/dst").await);
    }

    #[tokio::test]
    async fn save_due_honors_deadline() {
        let tree = PropertyTree::with_save_delay(Duration::from_secs(5));
        let store = PropertyStore::new(tree, settings());
        store
            .add("", "p", PropertySpec::input(DataType::Integer, 0))
            .await
            .unwrap();
        store.load().await.unwrap();
        store.set_value("p", 3).await.unwrap();
        assert_eq!(store.save_due(Instant::now()).await.unwrap(), 0);
        assert!(!store.settings().contains("values/p").await);
        let later = Instant::now() + Duration::from_secs(6);
        assert_eq!(store.save_due(later).await.unwrap(), 1);
        assert_eq!(
            store.settings().get_value("values/p").await.unwrap(),
            Value::Int(3)
        );
    }

    #[tokio::test]
    async fn stop_flushes_pending_saves() {
        let store = Arc::new(PropertyStore::new(PropertyTree::new(), settings()));
        store
            .add("", "p", PropertySpec::input(DataType::String, ""))
            .await
            .unwrap();
        store.load().await.unwrap();
        store.spawn_worker(DEFAULT_WORKER_PERIOD).await;
        store.set_value("p", "hello").await.unwrap();
        store.stop().await.unwrap();
        assert_eq!(
            store.settings().get_value("values/p").await.unwrap(),
            Value::Str("hello".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn worker_polls_functions() {
        let calls = Arc::new(AtomicI64::new(0));
        let counter = calls.clone();
        let store = Arc::new(PropertyStore::new(PropertyTree::new(), settings()));
        store
            .add(
                "",
                "uptime",
                PropertySpec::function(
                    DataType::Integer,
                    Duration::from_millis(100),
                    Some(Duration::from_secs(1)),
                    move || Ok(Value::Int(counter.fetch_add(1, Ordering::SeqCst))),
                ),
            )
            .await
            .unwrap();
        store.load().await.unwrap();
        store.spawn_worker(DEFAULT_WORKER_PERIOD).await;
        tokio::time::sleep(Duration::from_millis(2500)).await;
        store.stop().await.unwrap();
        let n = calls.load(Ordering::SeqCst);
        assert!((2..=4).contains(&n), "function called {n} times");
    }

    #[tokio::test]
    async fn interval_setting_round_trip() {
        let settings = settings();
        settings.set_deep("interval/f", 30.0).await.unwrap();
        let store = PropertyStore::new(PropertyTree::new(), settings);
        store
            .add(
                "",
                "f",
                PropertySpec::function(
                    DataType::Bool,
                    Duration::from_secs(1),
                    Some(Duration::from_secs(10)),
                    || Ok(true.into()),
                ),
            )
            .await
            .unwrap();
        store.load().await.unwrap();
        {
            let tree = store.tree();
            let tree = tree.lock().await;
            assert_eq!(tree.info("f").unwrap().poll_interval, Some(Duration::from_secs(30)));
        }
        store
            .set_poll_interval("f", Some(Duration::from_secs(10)))
            .await
            .unwrap();
        assert!(!store.settings().contains("interval/f").await);
    }
}
