// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Linux kernel ARP table.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use mrtooley_core::{MacAddress, MrTooleyError};

// 192.168.51.1     0x1         0x2         d8:44:89:c9:b7:c8     *        enp5s0
static ARP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\s+(0x1)\s+(\S+)\s+(\S{2}:\S{2}:\S{2}:\S{2}:\S{2}:\S{2})").unwrap()
});

/// Flags value of an entry that never resolved.
const INCOMPLETE: &str = "0x0";

/// IP to MAC map of complete ethernet entries.
pub fn parse_arp_table(text: &str) -> HashMap<String, MacAddress> {
    text.lines()
        .filter_map(|line| ARP_LINE.captures(line))
        .filter(|caps| &caps[3] != INCOMPLETE)
        .filter_map(|caps| {
            let mac = MacAddress::parse(&caps[4]).ok()?;
            Some((caps[1].to_string(), mac))
        })
        .collect()
}

pub async fn read_arp_table(path: &Path) -> Result<HashMap<String, MacAddress>, MrTooleyError> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        MrTooleyError::Network(format!("cannot read ARP table {}: {e}", path.display()))
    })?;
    Ok(parse_arp_table(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
IP address       HW type     Flags       HW address            Mask     Device
192.168.51.1     0x1         0x2         d8:44:89:c9:b7:c8     *        enp5s0
192.168.51.20    0x1         0x0         00:00:00:00:00:00     *        enp5s0
192.168.51.33    0x1         0x6         3c:22:fb:10:20:30     *        enp5s0
10.0.0.9         0x200       0x2         aa:bb:cc:dd:ee:ff     *        tun0
";

    #[test]
    fn complete_ethernet_entries_only() {
        let table = parse_arp_table(TABLE);
        assert_eq!(table.len(), 2);
        assert_eq!(table["192.168.51.1"], "D8:44:89:C9:B7:C8");
        assert_eq!(table["192.168.51.33"], "3c-22-fb-10-20-30");
        assert!(!table.contains_key("192.168.51.20"));
        assert!(!table.contains_key("10.0.0.9"));
    }

    #[tokio::test]
    async fn reads_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("arp");
        std::fs::write(&path, TABLE).unwrap();
        assert_eq!(read_arp_table(&path).await.unwrap().len(), 2);
        assert!(read_arp_table(&tmp.path().join("missing")).await.is_err());
    }
}
