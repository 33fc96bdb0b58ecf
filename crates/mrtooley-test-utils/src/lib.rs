// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for MrTooley integration tests.
//!
//! # Components
//!
//! - [`TestHarness`] - a full [`mrtooley::App`] on a temp directory
//! - [`storage_conformance`] - the scenario every storage backend must pass

pub mod conformance;
pub mod harness;

pub use conformance::storage_conformance;
pub use harness::{TestHarness, TestHarnessBuilder};
