// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MrTooley application core.
//!
//! [`App`] wires the configured root storage to the tool registry and the
//! workspace manager. The `mrtooley` binary is a thin command layer on top.

pub mod app;
pub mod tools;

pub use app::{App, TOOLS_KEY, WORKSPACES_KEY};
pub use tools::ToolManager;
