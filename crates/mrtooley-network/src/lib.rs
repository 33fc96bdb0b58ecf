// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Network helpers and tools for MrTooley.
//!
//! - [`oui`]: vendor names from nmap's MAC prefix list
//! - [`arp`]: the Linux kernel ARP table
//! - [`nmap`]: ping scans and the `nmap` tool

pub mod arp;
pub mod nmap;
pub mod oui;

use std::sync::Arc;

use uuid::{Uuid, uuid};

use mrtooley_config::model::NetworkConfig;
use mrtooley_core::{Categories, Category, Tool, ToolGroup};

pub use arp::{parse_arp_table, read_arp_table};
pub use nmap::{Address, Hostname, NmapScanner, ScanAddress, ScanEndpoint, ScanStatus, parse_nmap_xml};
pub use oui::{OuiDatabase, OuiLookup, locate};

pub const NETWORK_GROUP_NAME: &str = "network";
pub const NETWORK_GROUP_GUID: Uuid = uuid!("3b0f4c52-8e4d-4f7a-9a51-2d6f1c0e7b93");

/// Tools contributed by this crate.
#[derive(Debug)]
pub struct NetworkTools {
    config: NetworkConfig,
}

impl NetworkTools {
    pub fn new(config: NetworkConfig) -> Self {
        Self { config }
    }
}

impl Default for NetworkTools {
    fn default() -> Self {
        Self::new(NetworkConfig::default())
    }
}

impl ToolGroup for NetworkTools {
    fn name(&self) -> &str {
        NETWORK_GROUP_NAME
    }

    fn guid(&self) -> Uuid {
        NETWORK_GROUP_GUID
    }

    fn categories(&self) -> Categories {
        Categories::new([Category::Network])
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(NmapScanner::from_config(&self.config))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_contributes_nmap() {
        let group = NetworkTools::default();
        let tools = group.tools();
        assert_eq!(tools.len(), 1);
        let manifest = tools[0].manifest();
        assert_eq!(manifest.name, "nmap");
        assert_eq!(manifest.guid, nmap::NMAP_TOOL_GUID);
        assert!(manifest.categories.contains(Category::Network));
        assert_eq!(manifest.group.as_deref(), Some(NETWORK_GROUP_NAME));
    }
}
