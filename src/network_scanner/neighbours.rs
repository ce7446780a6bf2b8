//! MAC enrichment from the kernel neighbour table and a small OUI table

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use crate::models::{oui_prefix, Device};

pub const ARP_TABLE_PATH: &str = "/proc/net/arp";

/// Camera/recorder vendor OUIs. Keys are "XX:XX:XX" uppercase.
pub const OUI_CAMERA_VENDORS: &[(&str, &str)] = &[
    ("44:19:B6", "HIKVISION"),
    ("BC:AD:28", "HIKVISION"),
    ("C0:56:E3", "HIKVISION"),
    ("4C:BD:8F", "HIKVISION"),
    ("E0:50:8B", "DAHUA"),
    ("3C:EF:8C", "DAHUA"),
    ("90:02:A9", "DAHUA"),
    ("9C:8E:CD", "AMCREST"),
    ("00:40:8C", "AXIS"),
    ("AC:CC:8E", "AXIS"),
    ("B8:A4:4F", "AXIS"),
    ("EC:71:DB", "REOLINK"),
    ("70:5A:0F", "TP-LINK"),
    ("54:AF:97", "TP-LINK"),
    ("B0:A7:B9", "TP-LINK"),
    ("6C:5A:B0", "TP-LINK"),
    ("18:D6:C7", "TP-LINK"),
    ("48:EA:63", "UNIVIEW"),
    ("00:09:18", "HANWHA"),
    ("00:16:6C", "HANWHA"),
    ("C4:D6:55", "FOSCAM"),
];

/// Lookup OUI vendor from MAC address
pub fn lookup_oui(mac: &str) -> Option<&'static str> {
    let prefix = oui_prefix(mac)?;
    OUI_CAMERA_VENDORS
        .iter()
        .find(|(oui, _)| *oui == prefix)
        .map(|(_, vendor)| *vendor)
}

/// Parse `/proc/net/arp`. Incomplete entries (flags 0x0 or an all-zero
/// address) are skipped. MACs are returned uppercase.
pub fn parse_arp_table(contents: &str) -> HashMap<IpAddr, String> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return None;
            }
            let ip: IpAddr = cols[0].parse().ok()?;
            let flags = u32::from_str_radix(cols[2].trim_start_matches("0x"), 16).ok()?;
            let mac = cols[3].to_uppercase();
            if flags & 0x2 == 0 || mac == "00:00:00:00:00:00" {
                return None;
            }
            Some((ip, mac))
        })
        .collect()
}

/// Read the neighbour table; empty when unavailable (non-Linux, sandbox)
pub async fn read_arp_table(path: &Path) -> HashMap<IpAddr, String> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => parse_arp_table(&contents),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Neighbour table unavailable");
            HashMap::new()
        }
    }
}

/// Fill missing MACs from the neighbour table and missing manufacturers
/// from the OUI table. Returns the number of devices changed.
pub fn enrich_devices(devices: &mut [Device], arp: &HashMap<IpAddr, String>) -> usize {
    let mut changed = 0;
    for device in devices.iter_mut() {
        let mut touched = false;
        if device.mac.is_none() {
            if let Some(mac) = arp.get(&device.ip) {
                device.mac = Some(mac.clone());
                touched = true;
            }
        }
        if device.manufacturer.is_none() {
            if let Some(vendor) = device.mac.as_deref().and_then(lookup_oui) {
                device.manufacturer = Some(vendor.to_string());
                touched = true;
            }
        }
        if touched {
            changed += 1;
        }
    }
    changed
}
