// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete [`App`] whose config, user directory
//! and root storage all live in a temp directory. Dropping the harness
//! removes everything.

use std::path::{Path, PathBuf};

use mrtooley::App;
use mrtooley_config::MrTooleyConfig;
use mrtooley_core::MrTooleyError;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    backend: String,
    oui_prefixes: Option<String>,
    arp_table: Option<String>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            backend: "SQLITE".to_string(),
            oui_prefixes: None,
            arp_table: None,
        }
    }

    /// Root storage backend name (`SQLITE` or `JSON`).
    pub fn with_backend(mut self, backend: &str) -> Self {
        self.backend = backend.to_string();
        self
    }

    /// Contents of the `nmap-mac-prefixes` file placed in the nmap dir.
    pub fn with_oui_prefixes(mut self, prefixes: &str) -> Self {
        self.oui_prefixes = Some(prefixes.to_string());
        self
    }

    /// Contents of the ARP table file.
    pub fn with_arp_table(mut self, table: &str) -> Self {
        self.arp_table = Some(table.to_string());
        self
    }

    /// Build the test harness, creating the temp tree and the app.
    pub async fn build(self) -> Result<TestHarness, MrTooleyError> {
        let temp_dir = tempfile::TempDir::new()?;
        let base = temp_dir.path();

        let nmap_dir = base.join("nmap");
        std::fs::create_dir_all(&nmap_dir)?;
        if let Some(prefixes) = &self.oui_prefixes {
            std::fs::write(nmap_dir.join("nmap-mac-prefixes"), prefixes)?;
        }
        let arp_table = base.join("arp");
        if let Some(table) = &self.arp_table {
            std::fs::write(&arp_table, table)?;
        }

        let mut config = MrTooleyConfig::default();
        config.paths.rootconfig_dir = path_string(&base.join("root"));
        config.paths.user_dir = path_string(&base.join("user"));
        config.storage.backend = self.backend;
        config.storage.args = String::new();
        config.network.nmap_dir = Some(path_string(&nmap_dir));
        config.network.arp_table = path_string(&arp_table);

        let app = App::new(config.clone()).await?;
        Ok(TestHarness {
            app,
            config,
            _temp_dir: temp_dir,
        })
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// A complete app on temp storage.
pub struct TestHarness {
    /// The application under test.
    pub app: App,
    /// Config the app was built from.
    pub config: MrTooleyConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl std::fmt::Debug for TestHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestHarness")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Directory holding the root storage file.
    pub fn rootconfig_dir(&self) -> PathBuf {
        self.config.paths.rootconfig_path()
    }

    /// Shuts the app down and opens a fresh one on the same files.
    pub async fn restart(self) -> Result<Self, MrTooleyError> {
        let Self {
            app,
            config,
            _temp_dir,
        } = self;
        app.shutdown().await?;
        let app = App::new(config.clone()).await?;
        Ok(Self {
            app,
            config,
            _temp_dir,
        })
    }
}
