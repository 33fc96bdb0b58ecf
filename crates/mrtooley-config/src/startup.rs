// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Startup environment: `MT_*` variables and `NAME[=VALUE]` arguments.
//!
//! Both sources land in one flat name table. Arguments win over environment
//! variables. Names that correspond to a configuration key are later merged
//! into the figment as the highest-priority layer.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Prefix for environment variables that belong to MrTooley.
pub const ENV_PREFIX: &str = "MT_";

static ARG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:--)?([A-Za-z0-9_]+)(?:=(.*))?$").unwrap());

/// Startup names mapped onto dotted configuration keys.
///
/// Lookup is case-insensitive. Both the bare name and the `MT_`-prefixed form
/// are accepted on the command line.
const NAME_TO_KEY: &[(&str, &str)] = &[
    ("LOGLEVEL", "general.log_level"),
    ("LOG_LEVEL", "general.log_level"),
    ("ROOTCONFIG_DIR", "paths.rootconfig_dir"),
    ("USER_DIR", "paths.user_dir"),
    ("ROOT_STORAGE_TYPE", "storage.backend"),
    ("ROOT_STORAGE_ARGS", "storage.args"),
    ("NMAP_DIR", "network.nmap_dir"),
    ("NMAP_EXECUTABLE", "network.nmap_executable"),
    ("ARP_TABLE", "network.arp_table"),
];

/// Returns the configuration key for a startup name, if it has one.
pub fn config_key_for(name: &str) -> Option<&'static str> {
    let upper = name.to_ascii_uppercase();
    let bare = upper.strip_prefix(ENV_PREFIX).unwrap_or(&upper);
    NAME_TO_KEY
        .iter()
        .find(|(candidate, _)| *candidate == bare)
        .map(|(_, key)| *key)
}

/// True for values that mean "off": absent, `0`, `off`, `false`, `no`.
pub fn is_falsey(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => matches!(v, "0" | "OFF" | "FALSE" | "NO" | "off" | "false" | "no"),
    }
}

/// Flat name table built from the process environment and startup arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupEnvironment {
    values: BTreeMap<String, Option<String>>,
}

impl StartupEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `MT_*` variables from the current process.
    pub fn from_process() -> Self {
        let mut env = Self::new();
        env.absorb_env(std::env::vars());
        env
    }

    /// Adds every `MT_*` variable, stripping the prefix.
    pub fn absorb_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in vars {
            if let Some(bare) = name.as_ref().strip_prefix(ENV_PREFIX) {
                if !bare.is_empty() {
                    self.insert(bare, Some(value.into()));
                }
            }
        }
    }

    /// Parses `[--]NAME[=VALUE]` arguments. A bare `NAME` is stored without a
    /// value. Arguments that do not match are logged and skipped.
    pub fn absorb_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            let arg = arg.as_ref();
            let Some(caps) = ARG_PATTERN.captures(arg) else {
                tracing::warn!(argument = %arg, "could not parse startup argument");
                continue;
            };
            let name = &caps[1];
            let name = name
                .strip_prefix(ENV_PREFIX)
                .filter(|bare| !bare.is_empty())
                .unwrap_or(name);
            let value = caps.get(2).map(|m| m.as_str().to_string());
            self.insert(name, value);
        }
    }

    /// Stores `name` upper-cased. Any alias of the same configuration key is
    /// dropped first so the newest source owns that key.
    fn insert(&mut self, name: &str, value: Option<String>) {
        let name = name.to_ascii_uppercase();
        if let Some(key) = config_key_for(&name) {
            self.values.retain(|existing, _| config_key_for(existing) != Some(key));
        }
        self.values.insert(name, value);
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.absorb_args(args);
        self
    }

    /// Looks a name up, case-insensitively and through key aliases. The outer
    /// `Option` is presence, the inner one the value.
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        let name = name.to_ascii_uppercase();
        let found = self.values.get(&name).or_else(|| {
            let key = config_key_for(&name)?;
            self.values
                .iter()
                .find(|(existing, _)| config_key_for(existing) == Some(key))
                .map(|(_, value)| value)
        });
        found.map(|v| v.as_deref())
    }

    /// Value of `name`, treating bare flags as absent.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).flatten()
    }

    /// True when `name` is present and not falsey. A bare flag counts as set.
    pub fn flag(&self, name: &str) -> bool {
        match self.get(name) {
            None => false,
            Some(None) => true,
            Some(value) => !is_falsey(value),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pairs of `(config key, value)` for every name with a known key.
    pub fn config_overrides(&self) -> Vec<(&'static str, String)> {
        let mut overrides = Vec::new();
        for (name, value) in &self.values {
            match (config_key_for(name), value) {
                (Some(key), Some(value)) => overrides.push((key, value.clone())),
                (Some(key), None) => {
                    tracing::warn!(name = %name, key, "startup option needs a value, ignoring");
                }
                (None, _) => {}
            }
        }
        overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_with_and_without_dashes() {
        let env = StartupEnvironment::new().with_args([
            "--LOGLEVEL=DEBUG",
            "USER_DIR=/tmp/u",
            "--VERBOSE",
            "EMPTY=",
        ]);
        assert_eq!(env.value("LOGLEVEL"), Some("DEBUG"));
        assert_eq!(env.value("USER_DIR"), Some("/tmp/u"));
        assert_eq!(env.get("VERBOSE"), Some(None));
        assert_eq!(env.get("EMPTY"), Some(Some("")));
        assert_eq!(env.len(), 4);
    }

    #[test]
    fn unparsable_args_are_skipped() {
        let env = StartupEnvironment::new().with_args(["-x", "has space=1", "a-b=c"]);
        assert!(env.is_empty());
    }

    #[test]
    fn env_prefix_is_stripped_and_foreign_vars_ignored() {
        let mut env = StartupEnvironment::new();
        env.absorb_env([
            ("MT_ROOTCONFIG_DIR", "/srv/mt"),
            ("HOME", "/root"),
            ("MT_", "nothing"),
        ]);
        assert_eq!(env.value("ROOTCONFIG_DIR"), Some("/srv/mt"));
        assert!(env.get("HOME").is_none());
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn args_override_env() {
        let mut env = StartupEnvironment::new();
        env.absorb_env([("MT_LOGLEVEL", "INFO")]);
        env.absorb_args(["--MT_LOGLEVEL=ERROR"]);
        assert_eq!(env.value("LOGLEVEL"), Some("ERROR"));
    }

    #[test]
    fn args_override_env_through_aliases_and_case() {
        let mut env = StartupEnvironment::new();
        env.absorb_env([("MT_LOG_LEVEL", "error"), ("MT_USER_DIR", "/from/env")]);
        env.absorb_args(["LOGLEVEL=debug", "--user_dir=/from/arg"]);
        assert_eq!(env.len(), 2);
        assert_eq!(env.value("LOG_LEVEL"), Some("debug"));
        assert_eq!(env.value("loglevel"), Some("debug"));

        let overrides = env.config_overrides();
        assert_eq!(overrides.len(), 2);
        assert!(overrides.contains(&("general.log_level", "debug".to_string())));
        assert!(overrides.contains(&("paths.user_dir", "/from/arg".to_string())));
    }

    #[test]
    fn falsey_values() {
        for v in ["0", "OFF", "FALSE", "NO", "off", "false", "no"] {
            assert!(is_falsey(Some(v)), "{v} should be falsey");
        }
        assert!(is_falsey(None));
        for v in ["1", "yes", "on", "", "Off"] {
            assert!(!is_falsey(Some(v)), "{v} should not be falsey");
        }
    }

    #[test]
    fn flags() {
        let env = StartupEnvironment::new().with_args(["--DEBUG", "QUIET=no", "COLOR=1"]);
        assert!(env.flag("DEBUG"));
        assert!(!env.flag("QUIET"));
        assert!(env.flag("COLOR"));
        assert!(!env.flag("MISSING"));
    }

    #[test]
    fn known_names_become_overrides() {
        let env = StartupEnvironment::new().with_args([
            "--ROOT_STORAGE_TYPE=JSON",
            "--log_level=info",
            "--NMAP_DIR",
            "--UNRELATED=1",
        ]);
        let overrides = env.config_overrides();
        assert!(overrides.contains(&("storage.backend", "JSON".to_string())));
        assert!(overrides.contains(&("general.log_level", "info".to_string())));
        assert_eq!(overrides.len(), 2);
    }

    #[test]
    fn config_key_lookup_accepts_prefix() {
        assert_eq!(config_key_for("MT_USER_DIR"), Some("paths.user_dir"));
        assert_eq!(config_key_for("nmap_dir"), Some("network.nmap_dir"));
        assert_eq!(config_key_for("BOGUS"), None);
    }
}
