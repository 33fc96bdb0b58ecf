// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Application root: storage, tools and workspaces assembled from config.

use std::sync::Arc;

use tracing::{info, warn};

use mrtooley_config::MrTooleyConfig;
use mrtooley_core::{HealthStatus, MrTooleyError, PluginAdapter, StorageBackend};
use mrtooley_network::NetworkTools;
use mrtooley_plugin::{OfficialTools, discover_tools};
use mrtooley_storage::{BackendRegistry, StorageMapping, WorkspaceManager};

use crate::tools::ToolManager;

/// Root mapping holding per-tool settings.
pub const TOOLS_KEY: &str = "tools";
/// Root mapping holding workspaces.
pub const WORKSPACES_KEY: &str = "workspaces";

pub struct App {
    config: MrTooleyConfig,
    backend: Arc<dyn StorageBackend>,
    root: StorageMapping,
    tools: ToolManager,
    workspaces: WorkspaceManager,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("backend", &self.backend.name())
            .field("tools", &self.tools.registry().len())
            .finish()
    }
}

impl App {
    /// Opens root storage and builds the tool and workspace managers.
    pub async fn new(config: MrTooleyConfig) -> Result<Self, MrTooleyError> {
        mrtooley_config::ensure_dirs(&config)?;

        let backend = BackendRegistry::with_builtin()
            .open_from_config(&config)
            .await?;
        match backend.health_check().await? {
            HealthStatus::Healthy => {}
            status => warn!(backend = backend.name(), ?status, "root storage is not healthy"),
        }
        let root = StorageMapping::root(Arc::clone(&backend));
        let tools_settings = root.ensure_mapping(TOOLS_KEY).await?;
        let workspaces = WorkspaceManager::new(root.ensure_mapping(WORKSPACES_KEY).await?);

        let network = NetworkTools::new(config.network.clone());
        let registry = discover_tools(&[&OfficialTools, &network]);
        let tools = ToolManager::load(registry, tools_settings).await?;

        info!(
            backend = backend.name(),
            tools = tools.registry().len(),
            "application ready"
        );
        Ok(Self {
            config,
            backend,
            root,
            tools,
            workspaces,
        })
    }

    pub fn config(&self) -> &MrTooleyConfig {
        &self.config
    }

    /// The root storage mapping.
    pub fn storage(&self) -> &StorageMapping {
        &self.root
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolManager {
        &mut self.tools
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Flushes and closes root storage.
    pub async fn shutdown(self) -> Result<(), MrTooleyError> {
        self.root.flush().await?;
        self.backend.shutdown().await?;
        info!("application shut down");
        Ok(())
    }
}
