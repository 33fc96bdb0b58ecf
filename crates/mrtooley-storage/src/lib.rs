// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Path-addressed key-value storage for MrTooley.
//!
//! A backend holds a tree of mappings; [`StorageMapping`] is the path-aware
//! handle everything else works with. Two backends ship here: [`JsonFile`]
//! keeps one JSON document, [`SqliteFile`] keeps one row per node. The
//! [`BackendRegistry`] picks one by name, and [`WorkspaceManager`] layers
//! named, mountable workspaces on top.

pub mod codec;
pub mod fs;
pub mod json;
pub mod mapping;
pub mod migrations;
pub mod registry;
pub mod sqlite;
pub mod workspace;

pub use fs::OpenOptions;
pub use json::JsonFile;
pub use mapping::{Entry, StorageMapping};
pub use registry::BackendRegistry;
pub use sqlite::SqliteFile;
pub use workspace::{
    DEFAULT_WORKSPACE, Workspace, WorkspaceManager, parse_assignment, parse_cli_value,
};
