// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed property trees for MrTooley tools.
//!
//! A [`PropertyTree`] holds inputs, outputs, function properties and nested
//! dicts. Outputs and functions can be linked to inputs so that changes
//! flow from one tool to another. [`PropertyStore`] persists values, links,
//! poll intervals and float precisions into a settings mapping and runs the
//! background poller.

pub mod store;
pub mod tree;
pub mod types;

pub use store::{DEFAULT_WORKER_PERIOD, PropertyStore};
pub use tree::{DEFAULT_SAVE_DELAY, PropertyInfo, PropertyTree};
pub use types::{
    DEFAULT_FLOAT_PRECISION, MAX_FLOAT_PRECISION, DataType, PType, PollLimits, PropertyEvent, PropertyFn, PropertyId,
    PropertySpec, ValuePool,
};
