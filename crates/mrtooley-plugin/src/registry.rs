// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of compiled-in tools.
//!
//! The `ToolRegistry` stores `ToolEntry` records keyed by tool name. An entry
//! always has a manifest; the runnable tool is optional so manifests read
//! from `tool.toml` files can be listed before anything provides them.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use mrtooley_core::{Category, MrTooleyError, Tool, ToolGroup, ToolManifest};

/// Status of a tool in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Enabled,
    Disabled,
}

impl std::fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolStatus::Enabled => write!(f, "enabled"),
            ToolStatus::Disabled => write!(f, "disabled"),
        }
    }
}

/// A single entry in the tool registry.
pub struct ToolEntry {
    pub manifest: ToolManifest,
    pub status: ToolStatus,
    pub tool: Option<Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolEntry")
            .field("manifest", &self.manifest)
            .field("status", &self.status)
            .field("tool", &self.tool.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct ToolRegistry {
    entries: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool with status `Enabled`. A tool with the same name is
    /// replaced.
    pub fn register(&mut self, manifest: ToolManifest, tool: Option<Arc<dyn Tool>>) {
        self.register_with_status(manifest, tool, ToolStatus::Enabled);
    }

    pub fn register_with_status(
        &mut self,
        manifest: ToolManifest,
        tool: Option<Arc<dyn Tool>>,
        status: ToolStatus,
    ) {
        let name = manifest.name.clone();
        if let Some(old) = self.entries.get(&name)
            && old.manifest.guid != manifest.guid
        {
            warn!(tool = %name, old = %old.manifest.guid, new = %manifest.guid, "tool name registered twice");
        }
        self.entries.insert(
            name,
            ToolEntry {
                manifest,
                status,
                tool,
            },
        );
    }

    /// Registers every tool of `group`. Tools that do not name a group get
    /// this one.
    pub fn register_group(&mut self, group: &dyn ToolGroup) {
        for tool in group.tools() {
            let mut manifest = tool.manifest().clone();
            if manifest.group.is_none() {
                manifest.group = Some(group.name().to_string());
            }
            self.register(manifest, Some(tool));
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.entries.get(name)
    }

    /// Enabled tools in `category`, sorted by name.
    pub fn get_enabled(&self, category: Category) -> Vec<&ToolEntry> {
        let mut entries: Vec<&ToolEntry> = self
            .entries
            .values()
            .filter(|e| e.status == ToolStatus::Enabled && e.manifest.categories.contains(category))
            .collect();
        entries.sort_by(|a, b| a.manifest.name.cmp(&b.manifest.name));
        entries
    }

    /// All entries, sorted by name.
    pub fn list_all(&self) -> Vec<&ToolEntry> {
        let mut entries: Vec<&ToolEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.manifest.name.cmp(&b.manifest.name));
        entries
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), MrTooleyError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| MrTooleyError::ToolNotFound {
                name: name.to_string(),
            })?;
        entry.status = if enabled {
            ToolStatus::Enabled
        } else {
            ToolStatus::Disabled
        };
        Ok(())
    }

    /// Case-insensitive search over names and descriptions. An empty query
    /// matches everything.
    pub fn search(&self, query: &str) -> Vec<&ToolEntry> {
        let query = query.to_lowercase();
        self.list_all()
            .into_iter()
            .filter(|e| {
                query.is_empty()
                    || e.manifest.name.to_lowercase().contains(&query)
                    || e.manifest.description.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// The runnable tool registered under `name`.
    pub fn tool(&self, name: &str) -> Result<Arc<dyn Tool>, MrTooleyError> {
        self.entries
            .get(name)
            .and_then(|e| e.tool.clone())
            .ok_or_else(|| MrTooleyError::ToolNotFound {
                name: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
