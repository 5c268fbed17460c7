use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One alive host discovered by a range scan.
///
/// Identity is the address; everything else is best-effort evidence.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    pub ip_address: Ipv4Addr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    /// Real OS fingerprinting is not attempted; kept for the wire shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default)]
    pub open_ports: Vec<u16>,
    pub device_type: DeviceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtt_ms: Option<u64>,
}

impl Host {
    /// A bare host record with no evidence attached.
    pub fn new(ip_address: Ipv4Addr) -> Self {
        Self {
            ip_address,
            hostname: None,
            mac_address: None,
            vendor: None,
            os: None,
            open_ports: Vec::new(),
            device_type: DeviceKind::GenericDevice,
            rtt_ms: None,
        }
    }

    pub fn with_open_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.open_ports = ports.into_iter().collect();
        self
    }
}

/// Device category produced by the classifier.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Printer,
    RouterFirewall,
    MacosPc,
    RaspberryPi,
    WindowsPc,
    LinuxServer,
    LinuxPc,
    AndroidMobile,
    IosMobile,
    GenericDevice,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Printer => "printer",
            DeviceKind::RouterFirewall => "router_firewall",
            DeviceKind::MacosPc => "macos_pc",
            DeviceKind::RaspberryPi => "raspberry_pi",
            DeviceKind::WindowsPc => "windows_pc",
            DeviceKind::LinuxServer => "linux_server",
            DeviceKind::LinuxPc => "linux_pc",
            DeviceKind::AndroidMobile => "android_mobile",
            DeviceKind::IosMobile => "ios_mobile",
            DeviceKind::GenericDevice => "generic_device",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied description of a range scan.
///
/// Addresses stay as strings until validation so that a malformed request
/// can still be reported (and recorded in history) verbatim.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub start_ip: String,
    pub end_ip: String,
    /// Empty means "use the configured default ports".
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub search_hidden_hosts: bool,
    #[serde(default)]
    pub hidden_host_ports: Vec<u16>,
}

impl ScanRequest {
    pub fn new(start_ip: impl Into<String>, end_ip: impl Into<String>) -> Self {
        Self {
            start_ip: start_ip.into(),
            end_ip: end_ip.into(),
            ..Default::default()
        }
    }

    pub fn ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.ports = ports.into_iter().collect();
        self
    }

    pub fn hidden_hosts(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.search_hidden_hosts = true;
        self.hidden_host_ports = ports.into_iter().collect();
        self
    }
}

/// Online/offline transition observed by the monitor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub ip_address: Ipv4Addr,
    pub is_online: bool,
}

/// One remembered scan range.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub start_ip: String,
    pub end_ip: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
}

/// Outcome of a liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    pub alive: bool,
    pub rtt: Option<Duration>,
}

impl Liveness {
    pub fn alive(rtt: Duration) -> Self {
        Self {
            alive: true,
            rtt: Some(rtt),
        }
    }

    pub fn down() -> Self {
        Self {
            alive: false,
            rtt: None,
        }
    }
}
