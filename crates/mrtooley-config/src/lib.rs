// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for MrTooley.
//!
//! Settings come from TOML files, `MT_*` environment variables and
//! `NAME=VALUE` startup arguments, merged with figment and checked with
//! `deny_unknown_fields`. Errors render as miette diagnostics with typo
//! suggestions.
//!
//! ```no_run
//! use mrtooley_config::{StartupEnvironment, load_and_validate};
//!
//! let startup = StartupEnvironment::from_process();
//! let config = load_and_validate(&startup).expect("config errors");
//! println!("storage backend: {}", config.storage.backend);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod startup;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{MrTooleyConfig, expand_home};
pub use startup::{StartupEnvironment, is_falsey};

/// Loads the standard hierarchy and validates the result.
pub fn load_and_validate(
    startup: &StartupEnvironment,
) -> Result<MrTooleyConfig, Vec<ConfigError>> {
    match loader::load_config(startup) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(
            err,
            &collect_toml_sources(),
        )),
    }
}

/// Loads an explicit config file and validates the result.
pub fn load_and_validate_path(
    path: &Path,
    startup: &StartupEnvironment,
) -> Result<MrTooleyConfig, Vec<ConfigError>> {
    match loader::load_config_from_path(path, startup) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = std::fs::read_to_string(path)
                .map(|content| vec![(path.display().to_string(), content)])
                .unwrap_or_default();
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Loads a TOML string over the defaults and validates the result.
pub fn load_and_validate_str(toml_content: &str) -> Result<MrTooleyConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Creates the root config and user directories if missing.
///
/// New directories get mode `0700` on Unix.
pub fn ensure_dirs(config: &MrTooleyConfig) -> std::io::Result<()> {
    for dir in [config.paths.rootconfig_path(), config.paths.user_path()] {
        if dir.is_dir() {
            continue;
        }
        tracing::info!(path = %dir.display(), "creating directory");
        create_private_dir(&dir)?;
    }
    Ok(())
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

fn collect_toml_sources() -> Vec<(String, String)> {
    let mut candidates = vec![Path::new(loader::SYSTEM_CONFIG_PATH).to_path_buf()];
    candidates.extend(loader::user_config_path());
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(loader::LOCAL_CONFIG_NAME));
    }

    candidates
        .into_iter()
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_dirs_creates_private_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = MrTooleyConfig::default();
        config.paths.rootconfig_dir = tmp.path().join("root/nested").display().to_string();
        config.paths.user_dir = tmp.path().join("user").display().to_string();

        ensure_dirs(&config).unwrap();
        assert!(tmp.path().join("root/nested").is_dir());
        assert!(tmp.path().join("user").is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(tmp.path().join("user"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o700);
        }

        // Second call is a no-op.
        ensure_dirs(&config).unwrap();
    }
}
