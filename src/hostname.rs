use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use dns_lookup::lookup_addr;
use tracing::debug;

#[async_trait]
pub trait HostnameResolver: Send + Sync {
    async fn resolve(&self, addr: Ipv4Addr) -> Option<String>;
}

/// Reverse DNS through the system resolver.
///
/// The lookup is blocking, so it runs on the blocking pool under a timeout;
/// a lookup that outlives the timeout is abandoned, not cancelled.
pub struct ReverseDns {
    timeout: Duration,
}

impl ReverseDns {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl HostnameResolver for ReverseDns {
    async fn resolve(&self, addr: Ipv4Addr) -> Option<String> {
        let lookup = tokio::task::spawn_blocking(move || lookup_addr(&IpAddr::V4(addr)));
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(Ok(name))) => clean_hostname(&name, addr),
            Ok(Ok(Err(e))) => {
                debug!("reverse lookup {addr}: {e}");
                None
            }
            Ok(Err(e)) => {
                debug!("reverse lookup {addr}: task failed: {e}");
                None
            }
            Err(_) => {
                debug!("reverse lookup {addr}: timed out");
                None
            }
        }
    }
}

/// Strip the root dot; an answer that just echoes the address is no answer.
fn clean_hostname(name: &str, addr: Ipv4Addr) -> Option<String> {
    let name = name.trim().trim_end_matches('.');
    if name.is_empty() || name == addr.to_string() {
        return None;
    }
    Some(name.to_string())
}
