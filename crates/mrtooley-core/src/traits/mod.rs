// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions at the seams of the framework.
//!
//! Storage backends and tools both extend the [`PluginAdapter`] base trait and
//! use `#[async_trait]` for dynamic dispatch.

pub mod adapter;
pub mod storage;
pub mod tool;

pub use adapter::PluginAdapter;
pub use storage::StorageBackend;
pub use tool::{Tool, ToolGroup, ToolManifest, ToolOutput};
