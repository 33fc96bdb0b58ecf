// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the MrTooley tool framework.
//!
//! This crate provides the foundational trait definitions, error types, stored
//! values, key/path rules, and serializable datatypes used throughout the
//! workspace. Storage backends and tools implement traits defined here.

pub mod datatypes;
pub mod error;
pub mod logging;
pub mod path;
pub mod traits;
pub mod types;
pub mod value;

// Re-export key items at crate root for ergonomic imports.
pub use datatypes::{MacAddress, Serializable, SerializedObject, Serializer};
pub use error::MrTooleyError;
pub use logging::ToolLog;
pub use types::{AdapterType, Categories, Category, HealthStatus};
pub use value::{Item, NodeEntry, NodeId, Value, ValueKind, BASIC_SUPPORTED_KINDS};

pub use traits::{PluginAdapter, StorageBackend, Tool, ToolGroup, ToolManifest, ToolOutput};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_render() {
        let missing = MrTooleyError::key("tools/nmap");
        assert_eq!(missing.to_string(), "storage key error: tools/nmap");
        assert!(missing.is_missing_key());

        let crossing = MrTooleyError::MappingExpected {
            path: "path/x/y".into(),
            segment: "x".into(),
        };
        assert!(crossing.to_string().contains("'x'"));
        assert!(!crossing.is_missing_key());

        let io: MrTooleyError = std::io::Error::other("disk").into();
        assert!(matches!(io, MrTooleyError::Io(_)));
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_storage_backend<T: StorageBackend>() {}
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_tool<T: Tool>() {}
        fn _assert_tool_group<T: ToolGroup>() {}
    }

    #[test]
    fn adapter_type_roundtrip() {
        use std::str::FromStr;
        for variant in [AdapterType::Storage, AdapterType::Tool] {
            let parsed = AdapterType::from_str(&variant.to_string()).unwrap();
            assert_eq!(parsed, variant);
        }
    }
}
