// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the MrTooley crates.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Tool,
}

/// Functional area a tool belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Category {
    Unspecified,
    Network,
    Analysis,
    Management,
    DeviceDriver,
    ApplicationControl,
    Communication,
    Database,
    Monitoring,
}

/// A set of categories. Defaults to `{Unspecified}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Categories(BTreeSet<Category>);

impl Categories {
    pub fn new(categories: impl IntoIterator<Item = Category>) -> Self {
        let set: BTreeSet<Category> = categories.into_iter().collect();
        if set.is_empty() {
            return Self::default();
        }
        Self(set)
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0.contains(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.iter().copied()
    }
}

impl Default for Categories {
    fn default() -> Self {
        Self(BTreeSet::from([Category::Unspecified]))
    }
}

impl std::fmt::Display for Categories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!(Category::from_str("network").unwrap(), Category::Network);
        assert_eq!(
            Category::from_str("DEVICEDRIVER").unwrap(),
            Category::DeviceDriver
        );
        assert!(Category::from_str("Gardening").is_err());
    }

    #[test]
    fn category_display_roundtrip() {
        for category in Category::iter() {
            let parsed = Category::from_str(&category.to_string()).unwrap();
            assert_eq!(parsed, category);
        }
    }

    #[test]
    fn empty_categories_fall_back_to_unspecified() {
        let cats = Categories::new([]);
        assert!(cats.contains(Category::Unspecified));
        assert_eq!(cats.to_string(), "Unspecified");
    }

    #[test]
    fn categories_display_joins_sorted() {
        let cats = Categories::new([Category::Monitoring, Category::Network]);
        assert_eq!(cats.to_string(), "Network|Monitoring");
    }
}
