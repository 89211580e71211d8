//! Destination allow-list and external-address checks.

use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq)]
enum Pattern {
    Exact(String),
    Network { addr: IpAddr, prefix: u8 },
}

impl Pattern {
    fn parse(entry: &str) -> Self {
        let entry = entry.trim();
        if let Some((addr, prefix)) = entry.split_once('/') {
            if let (Ok(addr), Ok(prefix)) = (addr.parse::<IpAddr>(), prefix.parse::<u8>()) {
                let max = if addr.is_ipv4() { 32 } else { 128 };
                if prefix <= max {
                    return Pattern::Network { addr, prefix };
                }
            }
        }
        Pattern::Exact(entry.to_string())
    }

    fn matches(&self, destination: &str) -> bool {
        match self {
            Pattern::Exact(s) => s.eq_ignore_ascii_case(destination),
            Pattern::Network { addr, prefix } => match destination.parse::<IpAddr>() {
                Ok(dest) => in_network(dest, *addr, *prefix),
                Err(_) => false,
            },
        }
    }
}

fn in_network(dest: IpAddr, net: IpAddr, prefix: u8) -> bool {
    match (dest, net) {
        (IpAddr::V4(d), IpAddr::V4(n)) => {
            let mask = u32::MAX.checked_shl(32 - prefix as u32).unwrap_or(0);
            u32::from(d) & mask == u32::from(n) & mask
        }
        (IpAddr::V6(d), IpAddr::V6(n)) => {
            let mask = u128::MAX.checked_shl(128 - prefix as u32).unwrap_or(0);
            u128::from(d) & mask == u128::from(n) & mask
        }
        _ => false,
    }
}

/// Whether an address is routable on the public internet.
pub fn is_public(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.is_multicast())
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_public(IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            let unique_local = first & 0xfe00 == 0xfc00;
            let link_local = first & 0xffc0 == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || v6.is_multicast() || unique_local || link_local)
        }
    }
}

/// Decides whether a destination is unexpected for this network.
#[derive(Debug, Clone, Default)]
pub struct DestinationPolicy {
    expected: Vec<Pattern>,
    flag_external: bool,
}

impl DestinationPolicy {
    pub fn new(expected: &[String], flag_external: bool) -> Self {
        Self {
            expected: expected.iter().map(|e| Pattern::parse(e)).collect(),
            flag_external,
        }
    }

    /// A destination is suspicious when it is outside a non-empty allow-list,
    /// or (if enabled) when it is a public IP address.
    pub fn is_suspicious(&self, destination: Option<&str>) -> bool {
        let Some(dest) = destination.map(str::trim).filter(|d| !d.is_empty()) else {
            return false;
        };
        if !self.expected.is_empty() && !self.expected.iter().any(|p| p.matches(dest)) {
            return true;
        }
        self.flag_external && dest.parse::<IpAddr>().is_ok_and(is_public)
    }
}
