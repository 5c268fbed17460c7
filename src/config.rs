use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Ports scanned when a request does not name any.
pub const DEFAULT_PORTS: &[u16] = &[22, 80, 443, 8080, 445];

/// Tunables for scanning and monitoring. Every field has a default, so a
/// config file only needs the keys it wants to change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Addresses probed at the same time during a range scan.
    pub concurrency: usize,
    pub echo_timeout_ms: u64,
    /// Per-port connect timeout of the hidden-host fallback.
    pub hidden_probe_timeout_ms: u64,
    pub port_timeout_ms: u64,
    /// Per-port connect timeout when the monitor re-checks known open ports.
    pub monitor_port_timeout_ms: u64,
    pub dns_timeout_ms: u64,
    pub arp_timeout_ms: u64,
    pub monitor_interval_ms: u64,
    pub default_ports: Vec<u16>,
    pub history_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: 100,
            echo_timeout_ms: 1_000,
            hidden_probe_timeout_ms: 200,
            port_timeout_ms: 500,
            monitor_port_timeout_ms: 500,
            dns_timeout_ms: 2_000,
            arp_timeout_ms: 2_000,
            monitor_interval_ms: 10_000,
            default_ports: DEFAULT_PORTS.to_vec(),
            history_capacity: 10,
        }
    }
}

impl Config {
    /// Read a JSON config file; absent keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid config file: {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)?;
        Ok(config)
    }

    pub fn echo_timeout(&self) -> Duration {
        Duration::from_millis(self.echo_timeout_ms)
    }

    pub fn hidden_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.hidden_probe_timeout_ms)
    }

    pub fn port_timeout(&self) -> Duration {
        Duration::from_millis(self.port_timeout_ms)
    }

    pub fn monitor_port_timeout(&self) -> Duration {
        Duration::from_millis(self.monitor_port_timeout_ms)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    pub fn arp_timeout(&self) -> Duration {
        Duration::from_millis(self.arp_timeout_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = Config::from_json(r#"{"concurrency": 16, "monitor_interval_ms": 2500}"#).unwrap();
        assert_eq!(cfg.concurrency, 16);
        assert_eq!(cfg.monitor_interval(), Duration::from_millis(2500));
        assert_eq!(cfg.default_ports, DEFAULT_PORTS);
        assert_eq!(cfg.port_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_json(r#"{"concurency": 16}"#).is_err());
    }

    #[test]
    fn missing_file_has_context() {
        let err = Config::load("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
