// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with figment.
//!
//! Merge order, later layers win:
//! 1. Compiled defaults
//! 2. `/etc/mrtooley/mrtooley.toml`
//! 3. `~/.config/mrtooley/mrtooley.toml`
//! 4. `./mrtooley.toml`
//! 5. `MT_*` environment variables, plus a raw `NMAP_DIR`
//! 6. Startup arguments (`NAME=VALUE`)

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::MrTooleyConfig;
use crate::startup::{ENV_PREFIX, StartupEnvironment, config_key_for};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/mrtooley/mrtooley.toml";
pub const LOCAL_CONFIG_NAME: &str = "mrtooley.toml";

/// Per-user config file location, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mrtooley").join(LOCAL_CONFIG_NAME))
}

/// Loads from the standard file hierarchy, the environment and `startup`.
pub fn load_config(startup: &StartupEnvironment) -> Result<MrTooleyConfig, figment::Error> {
    build_figment(startup).extract()
}

/// Loads defaults merged with a TOML string only.
pub fn load_config_from_str(toml_content: &str) -> Result<MrTooleyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MrTooleyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Loads an explicit file instead of the hierarchy, still honoring the
/// environment and `startup`.
pub fn load_config_from_path(
    path: &Path,
    startup: &StartupEnvironment,
) -> Result<MrTooleyConfig, figment::Error> {
    let figment = Figment::new()
        .merge(Serialized::defaults(MrTooleyConfig::default()))
        .merge(Toml::file(path));
    with_overrides(figment, startup).extract()
}

/// The unextracted figment for the standard hierarchy.
pub fn build_figment(startup: &StartupEnvironment) -> Figment {
    let figment = Figment::new()
        .merge(Serialized::defaults(MrTooleyConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_NAME));
    with_overrides(figment, startup)
}

fn with_overrides(figment: Figment, startup: &StartupEnvironment) -> Figment {
    let mut figment = figment.merge(nmap_dir_provider()).merge(env_provider());
    for (key, value) in startup.config_overrides() {
        figment = figment.merge((key, value));
    }
    figment
}

/// `MT_*` variables mapped through the startup name table.
///
/// Variables without a config key are dropped here so that arbitrary `MT_`
/// names never trip `deny_unknown_fields`.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).filter_map(|key| config_key_for(key.as_str()).map(Into::into))
}

/// nmap installs document `NMAP_DIR` without our prefix.
fn nmap_dir_provider() -> Env {
    Env::raw()
        .only(&["NMAP_DIR"])
        .map(|_| "network.nmap_dir".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_args_override_files() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "mrtooley.toml",
                "[storage]\nbackend = \"JSON\"\n[general]\nlog_level = \"info\"\n",
            )?;
            let startup = StartupEnvironment::new().with_args(["--LOGLEVEL=debug"]);
            let config = load_config_from_path(Path::new("mrtooley.toml"), &startup)?;
            assert_eq!(config.storage.backend, "JSON");
            assert_eq!(config.general.log_level, "debug");
            Ok(())
        });
    }

    #[test]
    fn env_vars_are_mapped() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("MT_ROOT_STORAGE_ARGS", "/tmp/root.db");
            jail.set_env("MT_SOMETHING_ELSE", "ignored");
            jail.set_env("NMAP_DIR", "/opt/nmap");
            let config = load_config(&StartupEnvironment::new())?;
            assert_eq!(config.storage.args, "/tmp/root.db");
            assert_eq!(config.network.nmap_dir.as_deref(), Some("/opt/nmap"));
            Ok(())
        });
    }

    #[test]
    fn args_beat_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("MT_USER_DIR", "/from/env");
            let startup = StartupEnvironment::new().with_args(["USER_DIR=/from/arg"]);
            let config = load_config(&startup)?;
            assert_eq!(config.paths.user_dir, "/from/arg");
            Ok(())
        });
    }

    #[test]
    fn args_beat_env_under_another_spelling() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("MT_LOG_LEVEL", "error");
            jail.set_env("MT_USER_DIR", "/from/env");
            let mut startup = StartupEnvironment::new();
            startup.absorb_env([("MT_LOG_LEVEL", "error"), ("MT_USER_DIR", "/from/env")]);
            startup.absorb_args(["LOGLEVEL=debug", "user_dir=/from/arg"]);
            let config = load_config(&startup)?;
            assert_eq!(config.general.log_level, "debug");
            assert_eq!(config.paths.user_dir, "/from/arg");
            Ok(())
        });
    }
}
