// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use mrtooley_core::logging::parse_log_level;

use crate::diagnostic::ConfigError;
use crate::model::{KNOWN_STORAGE_BACKENDS, MrTooleyConfig};

/// Validates a deserialized configuration, collecting every problem.
pub fn validate_config(config: &MrTooleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if let Err(e) = parse_log_level(&config.general.log_level) {
        errors.push(ConfigError::validation(format!("general.log_level: {e}")));
    }

    let backend = config.storage.backend.trim().to_ascii_uppercase();
    if !KNOWN_STORAGE_BACKENDS.contains(&backend.as_str()) {
        errors.push(ConfigError::validation(format!(
            "storage.backend `{}` is not one of {}",
            config.storage.backend,
            KNOWN_STORAGE_BACKENDS.join(", ")
        )));
    }

    for (name, value) in [
        ("paths.rootconfig_dir", &config.paths.rootconfig_dir),
        ("paths.user_dir", &config.paths.user_dir),
        ("network.nmap_executable", &config.network.nmap_executable),
        ("network.arp_table", &config.network.arp_table),
    ] {
        if value.trim().is_empty() {
            errors.push(ConfigError::validation(format!("{name} must not be empty")));
        }
    }

    if let Some(dir) = &config.network.nmap_dir
        && dir.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "network.nmap_dir must not be empty when set",
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
