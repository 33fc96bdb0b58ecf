// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mrtooley oui` and `mrtooley scan`.

use std::io::IsTerminal;

use colored::Colorize;

use mrtooley_config::{MrTooleyConfig, expand_home};
use mrtooley_core::{MacAddress, MrTooleyError};
use mrtooley_network::{Address, NmapScanner, OuiLookup};

pub async fn run_oui(config: &MrTooleyConfig, mac: &str) -> Result<(), MrTooleyError> {
    let mac = MacAddress::parse(mac)?;
    let lookup = OuiLookup::new(config.network.nmap_dir.as_deref().map(expand_home));
    match lookup.lookup(&mac).await? {
        Some(vendor) => println!("{mac}  {vendor}"),
        None => println!("{mac}  (unknown vendor)"),
    }
    Ok(())
}

pub async fn run_scan(
    config: &MrTooleyConfig,
    destination: &str,
    lookup_macs: bool,
) -> Result<(), MrTooleyError> {
    let color = std::io::stdout().is_terminal();
    let scanner = NmapScanner::from_config(&config.network);
    let endpoints = scanner.pingscan(destination, lookup_macs).await?;
    if endpoints.is_empty() {
        println!("no hosts up");
        return Ok(());
    }
    for endpoint in &endpoints {
        let state = match (endpoint.status.up, color) {
            (true, true) => "up".green().to_string(),
            (false, true) => "down".red().to_string(),
            (true, false) => "up".to_string(),
            (false, false) => "down".to_string(),
        };
        let ips: Vec<String> = endpoint.ips().map(|ip| ip.to_string()).collect();
        println!("{:<5} {}", state, ips.join(", "));
        for address in &endpoint.addresses {
            if let Address::Mac(mac) = &address.address {
                let vendor = address.vendor.as_deref().unwrap_or("-");
                println!("      {mac}  {vendor}");
            }
        }
        for hostname in &endpoint.hostnames {
            match &hostname.kind {
                Some(kind) => println!("      {} ({kind})", hostname.name),
                None => println!("      {}", hostname.name),
            }
        }
    }
    Ok(())
}
