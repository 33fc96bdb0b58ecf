// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool registry bound to the `tools` storage mapping.
//!
//! Enabled state lives at `tools/<name>/enabled`. Tools without a stored
//! flag keep the status they were registered with.

use mrtooley_core::{MrTooleyError, ToolOutput, Value};
use mrtooley_plugin::{ToolEntry, ToolRegistry, ToolStatus};
use mrtooley_storage::StorageMapping;
use tracing::{debug, info, warn};

const ENABLED_KEY: &str = "enabled";

#[derive(Debug)]
pub struct ToolManager {
    registry: ToolRegistry,
    settings: StorageMapping,
}

impl ToolManager {
    /// Wraps `registry` and applies the enabled flags stored in `settings`.
    pub async fn load(
        mut registry: ToolRegistry,
        settings: StorageMapping,
    ) -> Result<Self, MrTooleyError> {
        let names: Vec<String> = registry
            .list_all()
            .into_iter()
            .map(|e| e.manifest.name.clone())
            .collect();
        for name in names {
            match settings.get_value(&enabled_path(&name)).await {
                Ok(Value::Bool(enabled)) => {
                    debug!(tool = %name, enabled, "applying stored tool state");
                    registry.set_enabled(&name, enabled)?;
                }
                Ok(other) => {
                    warn!(tool = %name, value = %other, "ignoring non-boolean enabled flag");
                }
                Err(e) if e.is_missing_key() => {}
                Err(e) => {
                    warn!(tool = %name, error = %e, "cannot read stored tool state");
                }
            }
        }
        Ok(Self { registry, settings })
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &StorageMapping {
        &self.settings
    }

    /// Changes a tool's status and persists it.
    pub async fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), MrTooleyError> {
        self.registry.set_enabled(name, enabled)?;
        self.settings.set_deep(&enabled_path(name), enabled).await?;
        info!(tool = %name, enabled, "tool state changed");
        Ok(())
    }

    /// Runs an enabled tool.
    pub async fn run(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<ToolOutput, MrTooleyError> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| MrTooleyError::ToolNotFound {
                name: name.to_string(),
            })?;
        if entry.status == ToolStatus::Disabled {
            return Err(MrTooleyError::Tool {
                message: format!("tool '{name}' is disabled"),
                source: None,
            });
        }
        let tool = self.registry.tool(name)?;
        debug!(tool = %name, "running tool");
        tool.run(input).await
    }

    pub fn list(&self) -> Vec<&ToolEntry> {
        self.registry.list_all()
    }
}

fn enabled_path(name: &str) -> String {
    format!("{name}/{ENABLED_KEY}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mrtooley_plugin::{HelloWorld, OfficialTools, discover_tools};
    use mrtooley_storage::JsonFile;

    use super::*;

    fn settings() -> StorageMapping {
        StorageMapping::root(Arc::new(JsonFile::in_memory()))
    }

    #[tokio::test]
    async fn disabling_persists_and_reapplies() {
        let store = settings();
        let mut manager = ToolManager::load(discover_tools(&[&OfficialTools]), store.clone())
            .await
            .unwrap();
        manager.set_enabled(HelloWorld::NAME, false).await.unwrap();
        assert_eq!(
            store.get_value("hello_world/enabled").await.unwrap(),
            Value::Bool(false)
        );

        let reloaded = ToolManager::load(discover_tools(&[&OfficialTools]), store)
            .await
            .unwrap();
        let entry = reloaded.registry().get(HelloWorld::NAME).unwrap();
        assert_eq!(entry.status, ToolStatus::Disabled);
    }

    #[tokio::test]
    async fn disabled_tool_does_not_run() {
        let mut manager = ToolManager::load(discover_tools(&[&OfficialTools]), settings())
            .await
            .unwrap();
        let out = manager
            .run(HelloWorld::NAME, serde_json::json!({"name": "Ada"}))
            .await
            .unwrap();
        assert_eq!(out.content, serde_json::json!("Hello, Ada!"));

        manager.set_enabled(HelloWorld::NAME, false).await.unwrap();
        let err = manager
            .run(HelloWorld::NAME, serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, MrTooleyError::Tool { .. }));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let mut manager = ToolManager::load(discover_tools(&[&OfficialTools]), settings())
            .await
            .unwrap();
        assert!(matches!(
            manager.set_enabled("nope", true).await,
            Err(MrTooleyError::ToolNotFound { .. })
        ));
        assert!(matches!(
            manager.run("nope", serde_json::Value::Null).await,
            Err(MrTooleyError::ToolNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn non_boolean_flag_is_ignored() {
        let store = settings();
        store.set_deep("hello_world/enabled", "maybe").await.unwrap();
        let manager = ToolManager::load(discover_tools(&[&OfficialTools]), store)
            .await
            .unwrap();
        assert_eq!(
            manager.registry().get(HelloWorld::NAME).unwrap().status,
            ToolStatus::Enabled
        );
    }
}
