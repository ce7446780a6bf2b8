use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::{Error, Result};

/// Parse CIDR notation (or a single IP) to an IP list
pub fn parse_cidr(cidr: &str) -> Result<Vec<IpAddr>> {
    let cidr = cidr.trim();
    let Some((base, prefix)) = cidr.split_once('/') else {
        return cidr
            .parse::<IpAddr>()
            .map(|ip| vec![ip])
            .map_err(|e| Error::Parse(format!("Invalid IP {}: {}", cidr, e)));
    };

    let base_ip: Ipv4Addr = base
        .parse()
        .map_err(|e| Error::Parse(format!("Invalid IP {}: {}", base, e)))?;
    let prefix: u8 = prefix
        .parse()
        .map_err(|e| Error::Parse(format!("Invalid prefix {}: {}", prefix, e)))?;

    if prefix > 32 {
        return Err(Error::Parse(format!("Invalid prefix: {} (must be 0-32)", prefix)));
    }
    if prefix < 16 {
        return Err(Error::Parse(format!("Refusing to scan /{}: larger than /16", prefix)));
    }

    let mask = if prefix == 0 { 0 } else { !((1u32 << (32 - prefix)) - 1) };
    let network = u32::from(base_ip) & mask;
    let broadcast = network | !mask;

    // Network and broadcast are skipped for /24 and smaller (except /31, /32)
    let (start, end) = if (24..=30).contains(&prefix) {
        (network + 1, broadcast - 1)
    } else {
        (network, broadcast)
    };

    Ok((start..=end).map(|ip| IpAddr::V4(Ipv4Addr::from(ip))).collect())
}

/// Expand every target and drop duplicates, first occurrence order kept
pub fn expand_targets<S: AsRef<str>>(targets: &[S]) -> Result<Vec<IpAddr>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for target in targets {
        for ip in parse_cidr(target.as_ref())? {
            if seen.insert(ip) {
                out.push(ip);
            }
        }
    }
    Ok(out)
}
