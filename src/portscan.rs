use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::debug;

use crate::probe::{knock, Knock};

/// Concurrent TCP connect scan of one host that is already known to be alive.
#[derive(Debug, Clone, Copy)]
pub struct PortScanner {
    timeout: Duration,
}

impl PortScanner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Ports on `addr` that accepted a connection, sorted ascending.
    ///
    /// Every candidate is dialled at once; a refusal is not "open", it only
    /// tells us the host is there.
    pub async fn scan(&self, addr: Ipv4Addr, ports: &[u16]) -> Vec<u16> {
        let mut seen = HashSet::new();
        let mut set = JoinSet::new();
        for &port in ports.iter().filter(|p| seen.insert(**p)) {
            let target = SocketAddr::new(IpAddr::V4(addr), port);
            let timeout = self.timeout;
            set.spawn(async move { (port, knock(target, timeout).await) });
        }

        let mut open = Vec::new();
        while let Some(joined) = set.join_next().await {
            if let Ok((port, Knock::Open(_))) = joined {
                open.push(port);
            }
        }
        open.sort_unstable();
        debug!("{addr}: open ports {open:?}");
        open
    }
}
