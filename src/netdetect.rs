use anyhow::{anyhow, Result};
use if_addrs::{get_if_addrs, IfAddr};
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

use crate::addr::AddressRange;

/// Detect local non-loopback IPv4 addresses and convert each to its /24.
///
/// For example, an interface IP `192.168.1.42` becomes `192.168.1.0/24`.
/// Duplicates are removed and the result is sorted.
pub fn detect_local_networks() -> Result<Vec<Ipv4Net>> {
    let mut nets: Vec<Ipv4Net> = get_if_addrs()?
        .into_iter()
        .filter_map(|iface| match iface.addr {
            IfAddr::V4(v4) if !v4.ip.is_loopback() && !v4.ip.is_link_local() => {
                Some(ipv4_to_default_cidr(v4.ip))
            }
            _ => None,
        })
        .collect();
    nets.sort_by_key(|n| u32::from(n.network()));
    nets.dedup();
    Ok(nets)
}

/// Host range of the first detected local /24 (`.1` through `.254`).
pub fn default_scan_range() -> Result<AddressRange> {
    let net = detect_local_networks()?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no non-loopback IPv4 interface found"))?;
    host_range(net).ok_or_else(|| anyhow!("network {net} has no host addresses"))
}

/// Helper: convert an IPv4 address into its default /24 network.
pub fn ipv4_to_default_cidr(ip: Ipv4Addr) -> Ipv4Net {
    let o = ip.octets();
    Ipv4Net::new(Ipv4Addr::new(o[0], o[1], o[2], 0), 24).expect("/24 is always valid")
}

/// Usable host addresses of `net`: network and broadcast excluded.
pub fn host_range(net: Ipv4Net) -> Option<AddressRange> {
    let start = u32::from(net.network());
    let end = u32::from(net.broadcast());
    if end - start < 2 {
        return None;
    }
    AddressRange::new(start + 1, end - 1).ok()
}
