// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing a recorded ping scan with ARP and OUI enrichment.

use std::path::PathBuf;

use mrtooley_network::{Address, OuiLookup, parse_nmap_xml, read_arp_table};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[tokio::test]
async fn recorded_pingscan_with_enrichment() {
    let xml = std::fs::read_to_string(fixture("pingscan.xml")).unwrap();
    let arp = read_arp_table(&fixture("arp")).await.unwrap();
    let lookup = OuiLookup::new(Some(fixture("nmap-mac-prefixes")));
    let oui = lookup.database().await.unwrap();

    let hosts = parse_nmap_xml(&xml, Some(&arp), Some(&oui)).unwrap();
    assert_eq!(hosts.len(), 3);
    assert!(hosts.iter().all(|h| h.status.up));

    // nmap reported this MAC itself.
    assert_eq!(hosts[0].macs().count(), 1);
    assert_eq!(
        hosts[0].addresses[1].vendor.as_deref(),
        Some("Extreme Networks")
    );

    // Filled in from the ARP table; the vendor comes from a sub-range stem.
    let added = hosts[1].addresses.last().unwrap();
    assert!(matches!(&added.address, Address::Mac(mac) if mac.to_string() == "8C:1F:64:00:A1:B2"));
    assert_eq!(added.vendor.as_deref(), Some("Example Sensors"));
    assert_eq!(hosts[1].hostnames.len(), 2);
    assert_eq!(hosts[1].hostnames[0].name, "printer.office");

    // Not in the table: stays IP-only.
    assert_eq!(hosts[2].macs().count(), 0);
}
