// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! nmap ping scans and their XML report.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::{Uuid, uuid};

use mrtooley_config::model::NetworkConfig;
use mrtooley_core::{
    Categories, Category, MacAddress, MrTooleyError, Tool, ToolLog, ToolManifest, ToolOutput,
};

use crate::arp::read_arp_table;
use crate::oui::{OuiDatabase, OuiLookup};

pub const NMAP_TOOL_GUID: Uuid = uuid!("e949e9f5-14d9-4832-bbbf-7db72bcc42fc");

/// `<status state="up" reason="arp-response" reasonsrc="..."/>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatus {
    pub up: bool,
    pub reason: Option<String>,
    pub reason_source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Address {
    Ip(IpAddr),
    Mac(MacAddress),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanAddress {
    pub addrtype: String,
    pub address: Address,
    pub vendor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hostname {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// One `<host>` of an nmap report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEndpoint {
    pub status: ScanStatus,
    pub addresses: Vec<ScanAddress>,
    pub hostnames: Vec<Hostname>,
}

impl ScanEndpoint {
    pub fn ips(&self) -> impl Iterator<Item = &IpAddr> {
        self.addresses.iter().filter_map(|a| match &a.address {
            Address::Ip(ip) => Some(ip),
            Address::Mac(_) => None,
        })
    }

    pub fn macs(&self) -> impl Iterator<Item = &MacAddress> {
        self.addresses.iter().filter_map(|a| match &a.address {
            Address::Mac(mac) => Some(mac),
            Address::Ip(_) => None,
        })
    }
}

fn non_empty(attr: Option<&str>) -> Option<String> {
    attr.filter(|s| !s.is_empty()).map(str::to_string)
}

fn parse_host(
    host: roxmltree::Node<'_, '_>,
    ip_to_mac: Option<&HashMap<String, MacAddress>>,
    oui: Option<&OuiDatabase>,
) -> ScanEndpoint {
    let status = host
        .children()
        .find(|n| n.has_tag_name("status"))
        .map(|n| ScanStatus {
            up: n.attribute("state") == Some("up"),
            reason: non_empty(n.attribute("reason")),
            reason_source: non_empty(n.attribute("reasonsrc")),
        })
        .unwrap_or_default();

    let mut addresses = Vec::new();
    let mut found_mac = false;
    for node in host.children().filter(|n| n.has_tag_name("address")) {
        let addrtype = node.attribute("addrtype").unwrap_or_default();
        let addr = node.attribute("addr").unwrap_or_default();
        let address = if addrtype == "mac" {
            found_mac = true;
            MacAddress::parse(addr).map(Address::Mac).ok()
        } else {
            addr.parse::<IpAddr>().map(Address::Ip).ok()
        };
        match address {
            Some(address) => addresses.push(ScanAddress {
                addrtype: addrtype.to_string(),
                address,
                vendor: non_empty(node.attribute("vendor")),
            }),
            None => warn!(addrtype, addr, "skipping unparsable address"),
        }
    }

    if !found_mac && let Some(ip_to_mac) = ip_to_mac {
        let mut seen = HashSet::new();
        let found: Vec<MacAddress> = addresses
            .iter()
            .filter_map(|a| match &a.address {
                Address::Ip(ip) => ip_to_mac.get(&ip.to_string()),
                Address::Mac(_) => None,
            })
            .filter(|mac| seen.insert(*mac.as_bytes()))
            .cloned()
            .collect();
        for mac in found {
            let vendor = oui.and_then(|db| db.lookup(&mac)).map(str::to_string);
            addresses.push(ScanAddress {
                addrtype: "mac".to_string(),
                address: Address::Mac(mac),
                vendor,
            });
        }
    }

    // <hostname name="scanme.nmap.org" type="user"/>
    let hostnames = host
        .children()
        .filter(|n| n.has_tag_name("hostnames"))
        .flat_map(|n| n.children().filter(|c| c.has_tag_name("hostname")))
        .filter_map(|n| {
            Some(Hostname {
                name: non_empty(n.attribute("name"))?,
                kind: non_empty(n.attribute("type")),
            })
        })
        .collect();

    ScanEndpoint {
        status,
        addresses,
        hostnames,
    }
}

/// Reads every `nmaprun/host` of an `-oX` report.
pub fn parse_nmap_xml(
    xml: &str,
    ip_to_mac: Option<&HashMap<String, MacAddress>>,
    oui: Option<&OuiDatabase>,
) -> Result<Vec<ScanEndpoint>, MrTooleyError> {
    // nmap writes `<!DOCTYPE nmaprun>`.
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = roxmltree::Document::parse_with_options(xml, options)
        .map_err(|e| MrTooleyError::Parse(format!("nmap XML: {e}")))?;
    let root = doc.root_element();
    if !root.has_tag_name("nmaprun") {
        return Err(MrTooleyError::Parse(format!(
            "nmap XML: expected <nmaprun>, found <{}>",
            root.tag_name().name()
        )));
    }
    Ok(root
        .children()
        .filter(|n| n.has_tag_name("host"))
        .map(|host| parse_host(host, ip_to_mac, oui))
        .collect())
}

/// The `nmap` tool.
pub struct NmapScanner {
    manifest: ToolManifest,
    executable: String,
    arp_table: PathBuf,
    oui: Arc<OuiLookup>,
    log: ToolLog,
}

impl std::fmt::Debug for NmapScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NmapScanner")
            .field("executable", &self.executable)
            .field("arp_table", &self.arp_table)
            .finish_non_exhaustive()
    }
}

impl NmapScanner {
    pub fn default_manifest() -> ToolManifest {
        ToolManifest {
            name: "nmap".to_string(),
            description: "nmap IP network scanner".to_string(),
            guid: NMAP_TOOL_GUID,
            version: 1,
            categories: Categories::new([Category::Network]),
            group: Some(crate::NETWORK_GROUP_NAME.to_string()),
            author: None,
        }
    }

    pub fn new(executable: impl Into<String>, arp_table: impl Into<PathBuf>, oui: Arc<OuiLookup>) -> Self {
        let manifest = Self::default_manifest();
        let log = ToolLog::new(&manifest.name, None);
        Self {
            manifest,
            executable: executable.into(),
            arp_table: arp_table.into(),
            oui,
            log,
        }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        let nmap_dir = config.nmap_dir.as_deref().map(mrtooley_config::expand_home);
        Self::new(
            config.nmap_executable.clone(),
            mrtooley_config::expand_home(&config.arp_table),
            Arc::new(OuiLookup::new(nmap_dir)),
        )
    }

    async fn arp_enrichment(&self) -> Option<(HashMap<String, MacAddress>, Option<Arc<OuiDatabase>>)> {
        let table = match read_arp_table(&self.arp_table).await {
            Ok(table) => table,
            Err(e) => {
                self.log.warn(&e.to_string());
                return None;
            }
        };
        let oui = match self.oui.database().await {
            Ok(db) => Some(db),
            Err(e) => {
                self.log.warn(&format!("vendor lookup unavailable: {e}"));
                None
            }
        };
        Some((table, oui))
    }

    /// `nmap -sn <destination> --unprivileged -n -oX -`
    ///
    /// With `lookup_missing_macs`, hosts nmap reported without a MAC get
    /// one from the kernel ARP table.
    pub async fn pingscan(
        &self,
        destination: &str,
        lookup_missing_macs: bool,
    ) -> Result<Vec<ScanEndpoint>, MrTooleyError> {
        if destination.is_empty() || destination.starts_with('-') {
            return Err(MrTooleyError::Tool {
                message: format!("invalid scan destination '{destination}'"),
                source: None,
            });
        }
        debug!(destination, executable = %self.executable, "starting ping scan");
        let output = Command::new(&self.executable)
            .args(["-sn", destination, "--unprivileged", "-n", "-oX", "-"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| MrTooleyError::Tool {
                message: format!("cannot run {}", self.executable),
                source: Some(Box::new(e)),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            self.log.err(&format!("STDERR: {}", stderr.trim_end()));
        }
        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            self.log.err(&format!("nmap exit code: {code}"));
        }

        let enrichment = if lookup_missing_macs {
            self.arp_enrichment().await
        } else {
            None
        };
        let (ip_to_mac, oui) = match &enrichment {
            Some((table, oui)) => (Some(table), oui.as_deref()),
            None => (None, None),
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_nmap_xml(&stdout, ip_to_mac, oui) {
            Ok(endpoints) => Ok(endpoints),
            Err(e) => {
                self.log.err(&e.to_string());
                Ok(Vec::new())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScanInput {
    destination: String,
    #[serde(default)]
    lookup_macs: bool,
}

#[async_trait]
impl Tool for NmapScanner {
    fn manifest(&self) -> &ToolManifest {
        &self.manifest
    }

    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput, MrTooleyError> {
        let input: ScanInput = serde_json::from_value(input).map_err(|e| MrTooleyError::Tool {
            message: "expected {\"destination\": str, \"lookup_macs\": bool}".to_string(),
            source: Some(Box::new(e)),
        })?;
        let endpoints = self.pingscan(&input.destination, input.lookup_macs).await?;
        let content = serde_json::to_value(&endpoints).map_err(|e| MrTooleyError::Tool {
            message: "cannot encode scan result".to_string(),
            source: Some(Box::new(e)),
        })?;
        Ok(ToolOutput::ok(content))
    }
}
