// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool and tool group traits.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MrTooleyError;
use crate::types::Categories;

/// Static description of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolManifest {
    /// Unique name used for lookup (e.g. "nmap").
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Stable identifier that survives renames.
    pub guid: Uuid,
    /// Tool revision, bumped on incompatible changes to stored settings.
    pub version: u32,
    pub categories: Categories,
    /// Name of the group the tool ships in.
    pub group: Option<String>,
    pub author: Option<String>,
}

/// Output from a tool run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: serde_json::Value,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: serde_json::Value) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: serde_json::Value::String(message.into()),
            is_error: true,
        }
    }
}

/// A unit of automation hosted by the framework.
#[async_trait]
pub trait Tool: Send + Sync {
    fn manifest(&self) -> &ToolManifest;

    /// Name of this instance when a tool is instantiated more than once.
    fn instance_name(&self) -> Option<&str> {
        None
    }

    /// Runs the tool with JSON input.
    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput, MrTooleyError>;
}

/// A named bundle of tools, discovered through the registry entry point.
pub trait ToolGroup: Send + Sync {
    fn name(&self) -> &str;

    fn guid(&self) -> Uuid;

    fn categories(&self) -> Categories {
        Categories::default()
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>>;
}
