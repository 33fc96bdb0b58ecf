// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and lifecycle shared by storage backends.

use async_trait::async_trait;

use crate::error::MrTooleyError;
use crate::types::{AdapterType, HealthStatus};

#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Short backend name, e.g. `sqlite`.
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    /// Whether the backing file or connection is still usable.
    async fn health_check(&self) -> Result<HealthStatus, MrTooleyError>;

    /// Flushes pending writes and releases the file or connection. The
    /// backend must not be used afterwards.
    async fn shutdown(&self) -> Result<(), MrTooleyError>;
}
