//! Host liveness detection.
//!
//! A [`LivenessProbe`] is an ordered list of [`Probe`] strategies. Each
//! strategy either proves the host alive or gives up; the first affirmative
//! answer wins and later strategies are never consulted.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use surge_ping::{Client, PingIdentifier, PingSequence};
use tokio::net::TcpStream;
use tokio::sync::OnceCell;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::types::Liveness;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Alive(Duration),
    Inconclusive,
}

/// One way of asking "is this host there?".
#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &'static str;

    async fn probe(&self, addr: Ipv4Addr) -> ProbeOutcome;
}

/// Result of a single timeout-bounded TCP connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Knock {
    Open(Duration),
    /// The host answered with a reset: present, port closed.
    Refused(Duration),
    TimedOut,
    Failed,
}

impl Knock {
    /// Round-trip time if the attempt proves the host is present.
    pub fn presence(&self) -> Option<Duration> {
        match *self {
            Knock::Open(rtt) | Knock::Refused(rtt) => Some(rtt),
            Knock::TimedOut | Knock::Failed => None,
        }
    }
}

/// Attempt one TCP connect and classify the answer. The connection, if any,
/// is closed before returning.
pub async fn knock(addr: SocketAddr, timeout: Duration) -> Knock {
    let start = Instant::now();
    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            let rtt = start.elapsed();
            drop(stream);
            Knock::Open(rtt)
        }
        Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
            Knock::Refused(start.elapsed())
        }
        Ok(Err(e)) => {
            debug!("connect {addr}: {e}");
            Knock::Failed
        }
        Err(_) => Knock::TimedOut,
    }
}

/// ICMP echo. Needs a raw or unprivileged-datagram ICMP socket; when the
/// platform refuses one the probe stays inconclusive for every host.
pub struct EchoProbe {
    timeout: Duration,
    client: OnceCell<Option<Client>>,
}

const ECHO_PAYLOAD: [u8; 56] = [0; 56];

impl EchoProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Option<&Client> {
        self.client
            .get_or_init(|| async {
                match Client::new(&surge_ping::Config::default()) {
                    Ok(client) => Some(client),
                    Err(e) => {
                        warn!("ICMP socket unavailable ({e}); echo probing disabled");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }
}

#[async_trait]
impl Probe for EchoProbe {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn probe(&self, addr: Ipv4Addr) -> ProbeOutcome {
        let Some(client) = self.client().await else {
            return ProbeOutcome::Inconclusive;
        };
        let mut pinger = client
            .pinger(IpAddr::V4(addr), PingIdentifier(rand::random()))
            .await;
        pinger.timeout(self.timeout);
        match pinger.ping(PingSequence(0), &ECHO_PAYLOAD).await {
            Ok((_, rtt)) => ProbeOutcome::Alive(rtt),
            Err(e) => {
                debug!("echo {addr}: {e}");
                ProbeOutcome::Inconclusive
            }
        }
    }
}

/// TCP connect against a list of ports, in order. An accepted or refused
/// connection both count as presence; timeouts and other errors move on.
pub struct TcpFallbackProbe {
    ports: Vec<u16>,
    timeout: Duration,
    name: &'static str,
}

impl TcpFallbackProbe {
    pub fn new(ports: Vec<u16>, timeout: Duration) -> Self {
        Self {
            ports,
            timeout,
            name: "tcp-fallback",
        }
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

#[async_trait]
impl Probe for TcpFallbackProbe {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn probe(&self, addr: Ipv4Addr) -> ProbeOutcome {
        for &port in &self.ports {
            let target = SocketAddr::new(IpAddr::V4(addr), port);
            if let Some(rtt) = knock(target, self.timeout).await.presence() {
                return ProbeOutcome::Alive(rtt);
            }
        }
        ProbeOutcome::Inconclusive
    }
}

/// Ordered probe strategies; first affirmative answer wins.
#[derive(Clone, Default)]
pub struct LivenessProbe {
    strategies: Vec<Arc<dyn Probe>>,
}

impl LivenessProbe {
    pub fn new(strategies: Vec<Arc<dyn Probe>>) -> Self {
        Self { strategies }
    }

    /// Echo first, then, when hidden-host search is on, TCP connects over the
    /// hidden-host ports.
    pub fn layered(
        echo: Arc<dyn Probe>,
        search_hidden_hosts: bool,
        hidden_host_ports: &[u16],
        hidden_timeout: Duration,
    ) -> Self {
        let mut strategies = vec![echo];
        if search_hidden_hosts && !hidden_host_ports.is_empty() {
            strategies.push(Arc::new(
                TcpFallbackProbe::new(hidden_host_ports.to_vec(), hidden_timeout)
                    .named("hidden-host"),
            ));
        }
        Self { strategies }
    }

    /// Put `probe` in front of every existing strategy.
    pub fn preceded_by(mut self, probe: Arc<dyn Probe>) -> Self {
        self.strategies.insert(0, probe);
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn check(&self, addr: Ipv4Addr) -> Liveness {
        for strategy in &self.strategies {
            if let ProbeOutcome::Alive(rtt) = strategy.probe(addr).await {
                debug!("{addr} alive via {} ({rtt:?})", strategy.name());
                return Liveness::alive(rtt);
            }
        }
        Liveness::down()
    }
}
