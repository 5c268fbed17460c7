//! Periodic online/offline tracking of a fixed set of hosts.
//!
//! At most one monitoring loop exists at a time. Starting a new session
//! cancels the previous loop and waits for it to exit before the new loop's
//! first cycle. Shared state lives behind one lock that is never held across
//! network I/O: each cycle snapshots what it needs, probes, then re-locks
//! only to commit.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::MonitorError;
use crate::events::{EventSink, NetEvent};
use crate::probe::{EchoProbe, LivenessProbe, Probe, TcpFallbackProbe};
use crate::task::TaskHandle;
use crate::types::{Host, StatusChange};

#[derive(Default)]
struct MonitorState {
    hosts: HashMap<Ipv4Addr, Host>,
    status: HashMap<Ipv4Addr, bool>,
    active: bool,
}

type SharedState = Arc<Mutex<MonitorState>>;

fn lock(state: &Mutex<MonitorState>) -> MutexGuard<'_, MonitorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Monitor {
    interval: Duration,
    hidden_timeout: Duration,
    known_port_timeout: Duration,
    echo: Arc<dyn Probe>,
    sink: OnceLock<Arc<dyn EventSink>>,
    state: SharedState,
    /// Serializes start/stop; holds the running loop, if any.
    session: AsyncMutex<Option<TaskHandle>>,
}

impl Monitor {
    pub fn new(config: &Config) -> Self {
        Self {
            interval: config.monitor_interval(),
            hidden_timeout: config.hidden_probe_timeout(),
            known_port_timeout: config.monitor_port_timeout(),
            echo: Arc::new(EchoProbe::new(config.echo_timeout())),
            sink: OnceLock::new(),
            state: SharedState::default(),
            session: AsyncMutex::new(None),
        }
    }

    pub fn with_echo_probe(mut self, echo: Arc<dyn Probe>) -> Self {
        self.echo = echo;
        self
    }

    /// Attach the sink status changes go to. Only the first call has an
    /// effect; returns whether this call was it.
    pub fn initialize(&self, sink: Arc<dyn EventSink>) -> bool {
        let fresh = self.sink.set(sink).is_ok();
        if fresh {
            debug!("monitor initialized");
        }
        fresh
    }

    /// Begin monitoring `hosts`, replacing any running session.
    ///
    /// Every host starts out assumed online; the first cycle runs right away
    /// and corrects that. An empty host list stops any previous session and
    /// leaves the monitor idle.
    pub async fn start(
        &self,
        hosts: Vec<Host>,
        search_hidden_hosts: bool,
        hidden_host_ports: Vec<u16>,
    ) -> Result<(), MonitorError> {
        let sink = self.sink.get().cloned().ok_or(MonitorError::NotInitialized)?;

        let mut session = self.session.lock().await;
        if let Some(previous) = session.take() {
            info!("monitoring already active; stopping previous session");
            previous.shutdown().await;
        }

        let mut state = lock(&self.state);
        state.hosts.clear();
        state.status.clear();
        state.active = false;
        if hosts.is_empty() {
            info!("no hosts to monitor");
            return Ok(());
        }
        for host in hosts {
            state.status.insert(host.ip_address, true);
            state.hosts.insert(host.ip_address, host);
        }
        state.active = true;
        let count = state.hosts.len();
        drop(state);

        let cycle = Cycle {
            echo: self.echo.clone(),
            search_hidden_hosts,
            hidden_host_ports,
            hidden_timeout: self.hidden_timeout,
            known_port_timeout: self.known_port_timeout,
            state: self.state.clone(),
            sink,
        };
        let interval = self.interval;
        *session = Some(TaskHandle::spawn(move |cancel| run_session(cycle, interval, cancel)));
        info!("monitoring {count} hosts every {interval:?}");
        Ok(())
    }

    /// Stop the running session and forget its hosts. Returns once the loop
    /// has exited; a no-op when nothing is running.
    pub async fn stop(&self) {
        let mut session = self.session.lock().await;
        let Some(running) = session.take() else {
            debug!("monitoring not active, nothing to stop");
            return;
        };
        running.shutdown().await;
        let mut state = lock(&self.state);
        state.hosts.clear();
        state.status.clear();
        state.active = false;
        info!("monitoring stopped");
    }

    pub fn is_active(&self) -> bool {
        lock(&self.state).active
    }

    /// Stop watching one address. Takes effect from its next check.
    pub fn remove_host(&self, addr: Ipv4Addr) -> bool {
        let mut state = lock(&self.state);
        state.status.remove(&addr);
        state.hosts.remove(&addr).is_some()
    }

    /// Snapshot of the monitored hosts, by address.
    pub fn hosts(&self) -> Vec<Host> {
        let mut hosts: Vec<Host> = lock(&self.state).hosts.values().cloned().collect();
        hosts.sort_by_key(|h| h.ip_address);
        hosts
    }

    /// Last known online state of every monitored address.
    pub fn statuses(&self) -> Vec<StatusChange> {
        let mut statuses: Vec<StatusChange> = lock(&self.state)
            .status
            .iter()
            .map(|(&ip_address, &is_online)| StatusChange {
                ip_address,
                is_online,
            })
            .collect();
        statuses.sort_by_key(|s| s.ip_address);
        statuses
    }
}

async fn run_session(cycle: Cycle, interval: Duration, cancel: CancellationToken) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => cycle.run(&cancel).await,
        }
    }
    lock(&cycle.state).active = false;
    debug!("monitoring loop exited");
}

/// Everything one session needs to run a check cycle.
struct Cycle {
    echo: Arc<dyn Probe>,
    search_hidden_hosts: bool,
    hidden_host_ports: Vec<u16>,
    hidden_timeout: Duration,
    known_port_timeout: Duration,
    state: SharedState,
    sink: Arc<dyn EventSink>,
}

impl Cycle {
    async fn run(&self, cancel: &CancellationToken) {
        let mut targets: Vec<Host> = lock(&self.state).hosts.values().cloned().collect();
        if targets.is_empty() {
            return;
        }
        targets.sort_by_key(|h| h.ip_address);
        debug!("status check for {} hosts", targets.len());

        for host in targets {
            if cancel.is_cancelled() {
                return;
            }
            if !lock(&self.state).hosts.contains_key(&host.ip_address) {
                debug!("{} no longer monitored, skipping", host.ip_address);
                continue;
            }
            let online = self.probe_for(&host).check(host.ip_address).await.alive;
            if let Some(change) = self.commit(host.ip_address, online) {
                info!(
                    "host {} is now {}",
                    change.ip_address,
                    if change.is_online { "online" } else { "offline" }
                );
                self.sink.publish(NetEvent::HostStatusUpdate(change));
            }
        }
    }

    /// The host's own open ports first, then the session's usual strategies.
    fn probe_for(&self, host: &Host) -> LivenessProbe {
        let probe = LivenessProbe::layered(
            self.echo.clone(),
            self.search_hidden_hosts,
            &self.hidden_host_ports,
            self.hidden_timeout,
        );
        if host.open_ports.is_empty() {
            return probe;
        }
        probe.preceded_by(Arc::new(
            TcpFallbackProbe::new(host.open_ports.clone(), self.known_port_timeout)
                .named("known-ports"),
        ))
    }

    /// Record the observation; a change is returned only on a transition
    /// for an address that is still monitored.
    fn commit(&self, addr: Ipv4Addr, online: bool) -> Option<StatusChange> {
        let mut state = lock(&self.state);
        let last = state.status.get_mut(&addr)?;
        if *last == online {
            return None;
        }
        *last = online;
        Some(StatusChange {
            ip_address: addr,
            is_online: online,
        })
    }
}
