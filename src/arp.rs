//! Best-effort hardware address lookup from the OS neighbour cache.
//!
//! Nothing here sends packets: a host we just probed is usually in the cache,
//! and when it is not the answer is simply "unknown".

use std::net::Ipv4Addr;
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tokio::time;
use tracing::debug;

#[async_trait]
pub trait ArpResolver: Send + Sync {
    /// Upper-case, colon-separated MAC for `addr`, if the cache has one.
    async fn resolve(&self, addr: Ipv4Addr) -> Option<String>;
}

/// Resolver for platforms with no supported neighbour cache.
pub struct NoArp;

#[async_trait]
impl ArpResolver for NoArp {
    async fn resolve(&self, _addr: Ipv4Addr) -> Option<String> {
        None
    }
}

/// Reads `/proc/net/arp` (Linux).
pub struct ProcArp {
    path: String,
}

impl ProcArp {
    pub fn new() -> Self {
        Self {
            path: "/proc/net/arp".into(),
        }
    }
}

impl Default for ProcArp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArpResolver for ProcArp {
    async fn resolve(&self, addr: Ipv4Addr) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(table) => parse_proc_net_arp(&table, addr),
            Err(e) => {
                debug!("read {}: {e}", self.path);
                None
            }
        }
    }
}

/// Shells out to the `arp` utility (macOS, Windows).
pub struct ArpCommand {
    args: &'static [&'static str],
    timeout: Duration,
}

impl ArpCommand {
    /// `arp -n <ip>`: no DNS, one entry.
    pub fn bsd(timeout: Duration) -> Self {
        Self {
            args: &["-n"],
            timeout,
        }
    }

    /// `arp -a <ip>`.
    pub fn windows(timeout: Duration) -> Self {
        Self {
            args: &["-a"],
            timeout,
        }
    }
}

#[async_trait]
impl ArpResolver for ArpCommand {
    async fn resolve(&self, addr: Ipv4Addr) -> Option<String> {
        let ip = addr.to_string();
        let output = Command::new("arp")
            .args(self.args)
            .arg(&ip)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();
        match time::timeout(self.timeout, output).await {
            Ok(Ok(out)) if out.status.success() => {
                parse_arp_output(&String::from_utf8_lossy(&out.stdout), addr)
            }
            Ok(Ok(out)) => {
                debug!("arp {ip}: exit {}", out.status);
                None
            }
            Ok(Err(e)) => {
                debug!("arp {ip}: {e}");
                None
            }
            Err(_) => {
                debug!("arp {ip}: timed out");
                None
            }
        }
    }
}

/// Pick the resolver for the platform we were built for.
pub fn system_resolver(timeout: Duration) -> Arc<dyn ArpResolver> {
    if cfg!(target_os = "linux") {
        Arc::new(ProcArp::new())
    } else if cfg!(target_os = "macos") {
        Arc::new(ArpCommand::bsd(timeout))
    } else if cfg!(target_os = "windows") {
        Arc::new(ArpCommand::windows(timeout))
    } else {
        Arc::new(NoArp)
    }
}

fn mac_regex() -> &'static Regex {
    static MAC: OnceLock<Regex> = OnceLock::new();
    MAC.get_or_init(|| {
        Regex::new(r"(?i)\b(?:[0-9a-f]{1,2}[:-]){5}[0-9a-f]{1,2}\b").expect("MAC pattern is valid")
    })
}

/// Normalize `0:1b:63:a-b-c` style spellings into `00:1B:63:0A:0B:0C`.
fn normalize_mac(raw: &str) -> Option<String> {
    let parts: Vec<String> = raw
        .split([':', '-'])
        .map(|p| format!("{:0>2}", p.to_ascii_uppercase()))
        .collect();
    let mac = parts.join(":");
    if parts.len() != 6 || mac == "00:00:00:00:00:00" || mac == "FF:FF:FF:FF:FF:FF" {
        return None;
    }
    Some(mac)
}

/// Find the MAC for `addr` in `arp` utility output.
///
/// A line only counts when one of its whitespace-separated fields is the
/// address itself (optionally in parentheses, as BSD prints it), so that
/// `10.0.0.1` never matches the entry for `10.0.0.10`.
pub fn parse_arp_output(output: &str, addr: Ipv4Addr) -> Option<String> {
    let ip = addr.to_string();
    output
        .lines()
        .filter(|line| {
            line.split_whitespace()
                .any(|field| field.trim_matches(|c| c == '(' || c == ')') == ip)
        })
        .find_map(|line| mac_regex().find(line).and_then(|m| normalize_mac(m.as_str())))
}

/// Find the MAC for `addr` in the Linux `/proc/net/arp` table.
///
/// Incomplete entries (flags `0x0`) carry an all-zero address and are skipped.
pub fn parse_proc_net_arp(table: &str, addr: Ipv4Addr) -> Option<String> {
    let ip = addr.to_string();
    table.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [entry_ip, _hw_type, flags, mac, ..] if *entry_ip == ip && *flags != "0x0" => {
                normalize_mac(mac)
            }
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC: &str = "\
IP address       HW type     Flags       HW address            Mask     Device
192.168.1.10     0x1         0x2         a4:5e:60:01:02:03     *        wlan0
192.168.1.1      0x1         0x2         00:11:22:33:44:55     *        wlan0
192.168.1.77     0x1         0x0         00:00:00:00:00:00     *        wlan0
";

    #[test]
    fn proc_table_exact_address_match() {
        let ip = Ipv4Addr::new(192, 168, 1, 1);
        assert_eq!(parse_proc_net_arp(PROC, ip).as_deref(), Some("00:11:22:33:44:55"));
        let ip = Ipv4Addr::new(192, 168, 1, 10);
        assert_eq!(parse_proc_net_arp(PROC, ip).as_deref(), Some("A4:5E:60:01:02:03"));
    }

    #[test]
    fn proc_table_skips_incomplete_and_missing() {
        assert_eq!(parse_proc_net_arp(PROC, Ipv4Addr::new(192, 168, 1, 77)), None);
        assert_eq!(parse_proc_net_arp(PROC, Ipv4Addr::new(192, 168, 1, 2)), None);
    }

    #[test]
    fn bsd_output_with_short_octets() {
        let out = "? (192.168.1.20) at 0:1b:63:a:b:c on en0 ifscope [ethernet]\n";
        assert_eq!(
            parse_arp_output(out, Ipv4Addr::new(192, 168, 1, 20)).as_deref(),
            Some("00:1B:63:0A:0B:0C")
        );
    }

    #[test]
    fn windows_table_picks_matching_row_only() {
        let out = "\
Interface: 192.168.1.5 --- 0x4
  Internet Address      Physical Address      Type
  192.168.1.10          aa-bb-cc-dd-ee-10     dynamic
  192.168.1.1           aa-bb-cc-dd-ee-01     dynamic
";
        assert_eq!(
            parse_arp_output(out, Ipv4Addr::new(192, 168, 1, 1)).as_deref(),
            Some("AA:BB:CC:DD:EE:01")
        );
        assert_eq!(parse_arp_output(out, Ipv4Addr::new(192, 168, 1, 5)), None);
    }

    #[test]
    fn linux_arp_no_entry() {
        let out = "192.168.1.99 (192.168.1.99) -- no entry\n";
        assert_eq!(parse_arp_output(out, Ipv4Addr::new(192, 168, 1, 99)), None);
    }
}
