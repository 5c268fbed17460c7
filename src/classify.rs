use std::net::Ipv4Addr;

use crate::types::DeviceKind;

const PRINTER_PORTS: &[u16] = &[631, 9100, 515];
const MAC_PORTS: &[u16] = &[22, 548, 445];
const WINDOWS_PORTS: &[u16] = &[135, 137, 138, 139, 445, 3389];
const SERVER_PORTS: &[u16] = &[5000, 5001, 8080, 8000, 3000];

const ROUTER_WORDS: &[&str] = &["router", "gateway", "firewall", "switch"];
const APPLE_WORDS: &[&str] = &["macbook", "imac", "apple"];
const SERVER_WORDS: &[&str] = &["server", "nas", "ubuntu-server", "centos", "debian"];

/// Gateway addresses common enough on home and office LANs to count as evidence.
const DEFAULT_GATEWAYS: &[Ipv4Addr] = &[
    Ipv4Addr::new(192, 168, 1, 1),
    Ipv4Addr::new(192, 168, 0, 1),
    Ipv4Addr::new(10, 0, 0, 1),
];

/// Guess a device category from the evidence gathered for a host.
///
/// Rules are checked in a fixed order and the first match wins. Hostname and
/// vendor comparisons are case-insensitive; an empty string means unknown.
pub fn classify(
    address: Ipv4Addr,
    hostname: &str,
    vendor: &str,
    open_ports: &[u16],
) -> DeviceKind {
    let hostname = hostname.to_lowercase();
    let vendor = vendor.to_lowercase();
    let has_any = |set: &[u16]| open_ports.iter().any(|p| set.contains(p));
    let named_any = |words: &[&str]| words.iter().any(|w| hostname.contains(w));

    if hostname.contains("printer") || has_any(PRINTER_PORTS) {
        return DeviceKind::Printer;
    }
    if named_any(ROUTER_WORDS) || DEFAULT_GATEWAYS.contains(&address) {
        return DeviceKind::RouterFirewall;
    }
    if named_any(APPLE_WORDS) || (has_any(MAC_PORTS) && !hostname.contains("linux")) {
        return DeviceKind::MacosPc;
    }
    if vendor.contains("apple") {
        return DeviceKind::MacosPc;
    }
    if vendor.contains("raspberry") {
        return DeviceKind::RaspberryPi;
    }
    if has_any(WINDOWS_PORTS) {
        return DeviceKind::WindowsPc;
    }
    if open_ports.contains(&22) {
        if named_any(SERVER_WORDS) || has_any(SERVER_PORTS) {
            return DeviceKind::LinuxServer;
        }
        return DeviceKind::LinuxPc;
    }
    if hostname.contains("android") {
        return DeviceKind::AndroidMobile;
    }
    if hostname.contains("iphone") || hostname.contains("ipad") {
        return DeviceKind::IosMobile;
    }
    DeviceKind::GenericDevice
}
