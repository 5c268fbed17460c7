#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use netview_rs::app::Probes;
use netview_rs::arp::ArpResolver;
use netview_rs::events::{EventSink, NetEvent};
use netview_rs::hostname::HostnameResolver;
use netview_rs::probe::{Probe, ProbeOutcome};
use netview_rs::vendor::VendorLookup;

/// Echo stand-in: answers for the addresses in `alive`, after `delay`.
/// Counts calls per address and the highest number of overlapping calls.
#[derive(Default)]
pub struct FakeEcho {
    alive: Mutex<HashSet<Ipv4Addr>>,
    delay: Duration,
    calls: Mutex<HashMap<Ipv4Addr, usize>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeEcho {
    pub fn new(alive: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        Self {
            alive: Mutex::new(alive.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_alive(&self, addr: Ipv4Addr, alive: bool) {
        let mut set = self.alive.lock().unwrap();
        if alive {
            set.insert(addr);
        } else {
            set.remove(&addr);
        }
    }

    pub fn calls(&self) -> HashMap<Ipv4Addr, usize> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for FakeEcho {
    fn name(&self) -> &'static str {
        "fake-echo"
    }

    async fn probe(&self, addr: Ipv4Addr) -> ProbeOutcome {
        *self.calls.lock().unwrap().entry(addr).or_default() += 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.alive.lock().unwrap().contains(&addr) {
            ProbeOutcome::Alive(Duration::from_millis(3))
        } else {
            ProbeOutcome::Inconclusive
        }
    }
}

#[derive(Default)]
pub struct FixedNames(pub HashMap<Ipv4Addr, String>);

#[async_trait]
impl HostnameResolver for FixedNames {
    async fn resolve(&self, addr: Ipv4Addr) -> Option<String> {
        self.0.get(&addr).cloned()
    }
}

#[derive(Default)]
pub struct FixedArp(pub HashMap<Ipv4Addr, String>);

#[async_trait]
impl ArpResolver for FixedArp {
    async fn resolve(&self, addr: Ipv4Addr) -> Option<String> {
        self.0.get(&addr).cloned()
    }
}

#[derive(Default)]
pub struct FixedVendors(pub HashMap<String, String>);

impl VendorLookup for FixedVendors {
    fn lookup(&self, mac: &str) -> Option<String> {
        self.0.get(mac).cloned()
    }
}

/// Records every event in publish order.
#[derive(Default)]
pub struct Collector(Mutex<Vec<NetEvent>>);

impl Collector {
    pub fn events(&self) -> Vec<NetEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn completions(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                NetEvent::ScanComplete(ok) => Some(ok),
                _ => None,
            })
            .collect()
    }

    pub fn status_updates(&self) -> Vec<(Ipv4Addr, bool)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                NetEvent::HostStatusUpdate(c) => Some((c.ip_address, c.is_online)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for Collector {
    fn publish(&self, event: NetEvent) {
        self.0.lock().unwrap().push(event);
    }
}

/// Offline collaborators around the given echo probe.
pub fn probes(echo: Arc<FakeEcho>) -> Probes {
    Probes {
        echo,
        hostnames: Arc::new(FixedNames::default()),
        arp: Arc::new(FixedArp::default()),
        vendors: Arc::new(FixedVendors::default()),
    }
}

pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

/// A localhost port nothing listens on.
pub async fn refused_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Poll `cond` until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
