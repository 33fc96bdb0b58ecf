// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool registry, manifest parser and the built-in tool group.
//!
//! Tools are compiled in and arrive in [`ToolGroup`]s. [`discover_tools`]
//! turns a list of groups into a [`ToolRegistry`].

pub mod manifest;
pub mod official;
pub mod registry;

use tracing::debug;

use mrtooley_core::ToolGroup;

pub use manifest::parse_tool_manifest;
pub use official::{HelloWorld, OfficialTools};
pub use registry::{ToolEntry, ToolRegistry, ToolStatus};

/// Builds a registry from compiled-in tool groups.
pub fn discover_tools(groups: &[&dyn ToolGroup]) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for group in groups {
        registry.register_group(*group);
        debug!(group = group.name(), guid = %group.guid(), "registered tool group");
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_registers_every_group() {
        let registry = discover_tools(&[&OfficialTools]);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(HelloWorld::NAME).is_some());
        assert!(discover_tools(&[]).is_empty());
    }
}
