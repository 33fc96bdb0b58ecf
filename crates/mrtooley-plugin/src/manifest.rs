// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool manifest parsing from `tool.toml` files.

use std::str::FromStr;

use serde::Deserialize;
use uuid::Uuid;

use mrtooley_core::{Categories, Category, MrTooleyError, ToolManifest};

#[derive(Debug, Deserialize)]
struct ToolManifestFile {
    tool: ToolSection,
}

/// The `[tool]` section of a `tool.toml` file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolSection {
    name: String,
    #[serde(default)]
    description: String,
    guid: String,
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    categories: Vec<String>,
    group: Option<String>,
    author: Option<String>,
}

fn default_version() -> u32 {
    1
}

/// Parse a tool manifest from TOML content.
///
/// Name and guid must be non-empty, the guid must be a UUID and every
/// category must name a [`Category`].
pub fn parse_tool_manifest(toml_content: &str) -> Result<ToolManifest, MrTooleyError> {
    let file: ToolManifestFile = toml::from_str(toml_content)
        .map_err(|e| MrTooleyError::Config(format!("invalid tool manifest: {e}")))?;
    let section = file.tool;

    if section.name.trim().is_empty() {
        return Err(MrTooleyError::Config(
            "tool manifest: name must not be empty".to_string(),
        ));
    }
    if section.guid.trim().is_empty() {
        return Err(MrTooleyError::Config(
            "tool manifest: guid must not be empty".to_string(),
        ));
    }
    let guid = Uuid::parse_str(section.guid.trim()).map_err(|e| {
        MrTooleyError::Config(format!(
            "tool manifest: guid '{}' is not a UUID: {e}",
            section.guid
        ))
    })?;

    let categories = section
        .categories
        .iter()
        .map(|name| {
            Category::from_str(name).map_err(|_| {
                MrTooleyError::Config(format!(
                    "tool manifest: invalid category '{name}'. Expected one of: Unspecified, Network, Analysis, Management, DeviceDriver, ApplicationControl, Communication, Database, Monitoring"
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ToolManifest {
        name: section.name,
        description: section.description,
        guid,
        version: section.version,
        categories: Categories::new(categories),
        group: section.group,
        author: section.author,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_manifest() {
        let toml = r#"
[tool]
name = "nmap"
description = "nmap IP network scanner"
guid = "e949e9f5-14d9-4832-bbbf-7db72bcc42fc"
version = 2
categories = ["Network", "monitoring"]
group = "network"
author = "MrTooley Contributors"
"#;
        let manifest = parse_tool_manifest(toml).unwrap();
        assert_eq!(manifest.name, "nmap");
        assert_eq!(manifest.version, 2);
        assert_eq!(
            manifest.guid.to_string(),
            "e949e9f5-14d9-4832-bbbf-7db72bcc42fc"
        );
        assert!(manifest.categories.contains(Category::Network));
        assert!(manifest.categories.contains(Category::Monitoring));
        assert_eq!(manifest.group.as_deref(), Some("network"));
        assert_eq!(manifest.author.as_deref(), Some("MrTooley Contributors"));
    }

    #[test]
    fn parse_minimal_manifest() {
        let toml = r#"
[tool]
name = "hello"
guid = "0b9d8f4e-6c1a-4e55-9d1e-5a7c2b3f4e10"
"#;
        let manifest = parse_tool_manifest(toml).unwrap();
        assert_eq!(manifest.version, 1);
        assert!(manifest.description.is_empty());
        assert_eq!(manifest.categories, Categories::default());
        assert!(manifest.group.is_none());
    }

    #[test]
    fn parse_missing_name() {
        let toml = r#"
[tool]
name = ""
guid = "0b9d8f4e-6c1a-4e55-9d1e-5a7c2b3f4e10"
"#;
        let err = parse_tool_manifest(toml).unwrap_err().to_string();
        assert!(err.contains("name must not be empty"));
    }

    #[test]
    fn parse_bad_guid() {
        let toml = r#"
[tool]
name = "x"
guid = "not-a-uuid"
"#;
        let err = parse_tool_manifest(toml).unwrap_err().to_string();
        assert!(err.contains("is not a UUID"));

        let toml = "[tool]\nname = \"x\"\nguid = \"\"\n";
        let err = parse_tool_manifest(toml).unwrap_err().to_string();
        assert!(err.contains("guid must not be empty"));
    }

    #[test]
    fn parse_invalid_category() {
        let toml = r#"
[tool]
name = "x"
guid = "0b9d8f4e-6c1a-4e55-9d1e-5a7c2b3f4e10"
categories = ["Gardening"]
"#;
        let err = parse_tool_manifest(toml).unwrap_err().to_string();
        assert!(err.contains("invalid category 'Gardening'"));
    }

    #[test]
    fn parse_missing_section() {
        assert!(parse_tool_manifest("[plugin]\nname = \"x\"\n").is_err());
    }
}
