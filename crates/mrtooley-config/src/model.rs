// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a typo in a config file
//! is reported at startup instead of being silently ignored.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Storage backends the application knows how to open.
pub const KNOWN_STORAGE_BACKENDS: &[&str] = &["SQLITE", "JSON"];

/// Top-level MrTooley configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MrTooleyConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    /// Locations of the root config directory and the user directory.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Root storage backend selection.
    #[serde(default)]
    pub storage: StorageConfig,

    /// External network tooling.
    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    /// Logging level (NOTSET, DEBUG, INFO, WARNING, ERROR, CRITICAL).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warning".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Holds the root storage file and other machine-local state.
    #[serde(default = "default_rootconfig_dir")]
    pub rootconfig_dir: String,

    /// User-visible working directory.
    #[serde(default = "default_user_dir")]
    pub user_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            rootconfig_dir: default_rootconfig_dir(),
            user_dir: default_user_dir(),
        }
    }
}

impl PathsConfig {
    pub fn rootconfig_path(&self) -> PathBuf {
        expand_home(&self.rootconfig_dir)
    }

    pub fn user_path(&self) -> PathBuf {
        expand_home(&self.user_dir)
    }
}

fn default_rootconfig_dir() -> String {
    "~/.mrtooley".to_string()
}

fn default_user_dir() -> String {
    "~/MrTooley".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Backend name, one of [`KNOWN_STORAGE_BACKENDS`] (case-insensitive).
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Backend-specific argument, usually a file path. Empty selects the
    /// default file inside `paths.rootconfig_dir`.
    #[serde(default)]
    pub args: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            args: String::new(),
        }
    }
}

fn default_backend() -> String {
    "SQLITE".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    /// nmap binary, looked up on `PATH` unless absolute.
    #[serde(default = "default_nmap_executable")]
    pub nmap_executable: String,

    /// Directory of an nmap installation, used to find `nmap-mac-prefixes`.
    #[serde(default)]
    pub nmap_dir: Option<String>,

    /// Kernel ARP table used to fill in MAC addresses nmap could not see.
    #[serde(default = "default_arp_table")]
    pub arp_table: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            nmap_executable: default_nmap_executable(),
            nmap_dir: None,
            arp_table: default_arp_table(),
        }
    }
}

fn default_nmap_executable() -> String {
    "nmap".to_string()
}

fn default_arp_table() -> String {
    "/proc/net/arp".to_string()
}

/// Expands a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
