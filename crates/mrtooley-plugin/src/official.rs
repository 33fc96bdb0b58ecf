// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tools shipped with MrTooley itself.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::{Uuid, uuid};

use mrtooley_core::{Categories, MrTooleyError, Tool, ToolGroup, ToolLog, ToolManifest, ToolOutput};

pub const OFFICIAL_GROUP_NAME: &str = "official";
pub const OFFICIAL_GROUP_GUID: Uuid = uuid!("6f2a1c9e-3d4b-4a8f-b1e7-0c5d9e2f7a31");

/// The built-in tool group.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfficialTools;

impl ToolGroup for OfficialTools {
    fn name(&self) -> &str {
        OFFICIAL_GROUP_NAME
    }

    fn guid(&self) -> Uuid {
        OFFICIAL_GROUP_GUID
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(HelloWorld::new(None))]
    }
}

/// Replies with a greeting. Useful to check that tools run at all.
#[derive(Debug)]
pub struct HelloWorld {
    manifest: ToolManifest,
    instance: Option<String>,
    log: ToolLog,
}

impl HelloWorld {
    pub const NAME: &'static str = "hello_world";
    pub const GUID: Uuid = uuid!("a4d7c2e0-8b1f-4c3a-9e6d-5f2b7a1c0d84");

    pub fn new(instance: Option<String>) -> Self {
        let manifest = ToolManifest {
            name: Self::NAME.to_string(),
            description: "Replies with a greeting".to_string(),
            guid: Self::GUID,
            version: 1,
            categories: Categories::default(),
            group: Some(OFFICIAL_GROUP_NAME.to_string()),
            author: Some("MrTooley Contributors".to_string()),
        };
        let log = ToolLog::new(Self::NAME, instance.as_deref());
        Self {
            manifest,
            instance,
            log,
        }
    }
}

#[async_trait]
impl Tool for HelloWorld {
    fn manifest(&self) -> &ToolManifest {
        &self.manifest
    }

    fn instance_name(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput, MrTooleyError> {
        let name = input
            .get("name")
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("World");
        self.log.info(&format!("greeting {name}"));
        Ok(ToolOutput::ok(serde_json::Value::String(format!(
            "Hello, {name}!"
        ))))
    }
}
