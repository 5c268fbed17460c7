//! Process-wide state: one scanner, one monitor, the scan history and the
//! hosts found by the latest scan.
//!
//! Lifecycle: [`App::new`] builds everything, [`App::startup`] attaches the
//! monitor to the event sink (the monitor refuses to start before that),
//! [`App::shutdown`] cancels any scan and stops monitoring.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

use crate::arp::{self, ArpResolver};
use crate::config::Config;
use crate::error::{MonitorError, ScanError};
use crate::events::{EventSink, NetEvent};
use crate::history::{HistoryStore, MemoryHistory};
use crate::hostname::{HostnameResolver, ReverseDns};
use crate::monitor::Monitor;
use crate::probe::{EchoProbe, Probe};
use crate::scanner::{RangeScanner, ScanState, ScanSummary};
use crate::task::TaskHandle;
use crate::types::{Host, HistoryEntry, ScanRequest, StatusChange};
use crate::vendor::{OuiVendors, VendorLookup};

/// The network-facing collaborators, chosen once at composition time.
#[derive(Clone)]
pub struct Probes {
    pub echo: Arc<dyn Probe>,
    pub hostnames: Arc<dyn HostnameResolver>,
    pub arp: Arc<dyn ArpResolver>,
    pub vendors: Arc<dyn VendorLookup>,
}

impl Probes {
    /// Real ICMP, reverse DNS, the platform's ARP cache and the OUI registry.
    pub fn system(config: &Config) -> Self {
        Self {
            echo: Arc::new(EchoProbe::new(config.echo_timeout())),
            hostnames: Arc::new(ReverseDns::new(config.dns_timeout())),
            arp: arp::system_resolver(config.arp_timeout()),
            vendors: Arc::new(OuiVendors),
        }
    }
}

/// Keeps the latest scan's hosts and state in step with the events the
/// scanner publishes, then forwards every event.
struct Recorder {
    hosts: Mutex<BTreeMap<Ipv4Addr, Host>>,
    state: Mutex<ScanState>,
    outer: Arc<dyn EventSink>,
}

impl Recorder {
    fn set_state(&self, state: ScanState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl EventSink for Recorder {
    fn publish(&self, event: NetEvent) {
        if let NetEvent::HostFound(host) = &event {
            self.hosts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(host.ip_address, host.clone());
        }
        self.outer.publish(event);
    }
}

pub struct App {
    recorder: Arc<Recorder>,
    scanner: Arc<RangeScanner>,
    monitor: Monitor,
    history: Arc<dyn HistoryStore>,
    scan: AsyncMutex<Option<TaskHandle<ScanSummary>>>,
}

impl App {
    pub fn new(config: &Config, sink: Arc<dyn EventSink>) -> Self {
        Self::with_probes(config, sink, Probes::system(config))
    }

    pub fn with_probes(config: &Config, sink: Arc<dyn EventSink>, probes: Probes) -> Self {
        let recorder = Arc::new(Recorder {
            hosts: Mutex::new(BTreeMap::new()),
            state: Mutex::new(ScanState::Idle),
            outer: sink,
        });
        let history: Arc<dyn HistoryStore> = Arc::new(MemoryHistory::new(config.history_capacity));
        let scanner = RangeScanner::new(config, recorder.clone())
            .with_echo_probe(probes.echo.clone())
            .with_hostname_resolver(probes.hostnames)
            .with_arp_resolver(probes.arp)
            .with_vendor_lookup(probes.vendors)
            .with_history(history.clone());
        let monitor = Monitor::new(config).with_echo_probe(probes.echo);
        Self {
            recorder,
            scanner: Arc::new(scanner),
            monitor,
            history,
            scan: AsyncMutex::new(None),
        }
    }

    pub fn startup(&self) {
        if self.monitor.initialize(self.recorder.clone()) {
            info!("application started");
        }
    }

    /// Start a scan, cancelling (and waiting out) any scan still running.
    ///
    /// Returns once the request is validated; the sweep continues in the
    /// background. A rejected request has already produced its `scanError`
    /// and `scanComplete(false)` events.
    pub async fn scan(&self, request: ScanRequest) -> Result<(), ScanError> {
        let mut running = self.scan.lock().await;
        if let Some(previous) = running.take() {
            info!("cancelling previous scan");
            previous.shutdown().await;
        }

        self.recorder.set_state(ScanState::Validating);
        let accepted = match self.scanner.accept(request) {
            Ok(accepted) => accepted,
            Err(e) => {
                self.recorder.set_state(ScanState::Failed);
                return Err(e);
            }
        };
        self.recorder
            .hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.recorder.set_state(ScanState::Running);

        let scanner = self.scanner.clone();
        let recorder = self.recorder.clone();
        *running = Some(TaskHandle::spawn(move |cancel| async move {
            let summary = scanner.sweep(accepted, cancel).await;
            recorder.set_state(summary.state);
            summary
        }));
        Ok(())
    }

    /// Wait for the current scan to finish on its own. Dropping the future
    /// early leaves the scan running and cancellable.
    pub async fn wait_for_scan(&self) -> Option<ScanSummary> {
        let mut running = self.scan.lock().await;
        let summary = running.as_mut()?.wait().await;
        running.take();
        summary
    }

    /// Ask the current scan to stop and wait until its workers are done.
    pub async fn cancel_scan(&self) -> Option<ScanSummary> {
        let running = self.scan.lock().await.take()?;
        running.shutdown().await
    }

    pub fn scan_state(&self) -> ScanState {
        *self
            .recorder
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Hosts found by the latest scan, by address.
    pub fn hosts(&self) -> Vec<Host> {
        self.recorder
            .hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.entries()
    }

    /// Monitor the given addresses, or every host of the latest scan when
    /// `addresses` is `None`. Addresses the scan did not find are monitored
    /// with no known open ports.
    pub async fn start_monitoring(
        &self,
        addresses: Option<Vec<Ipv4Addr>>,
        search_hidden_hosts: bool,
        hidden_host_ports: Vec<u16>,
    ) -> Result<(), MonitorError> {
        let known: BTreeMap<Ipv4Addr, Host> = self
            .hosts()
            .into_iter()
            .map(|h| (h.ip_address, h))
            .collect();
        let hosts = match addresses {
            None => known.into_values().collect(),
            Some(addrs) => addrs
                .into_iter()
                .map(|ip| known.get(&ip).cloned().unwrap_or_else(|| Host::new(ip)))
                .collect(),
        };
        self.monitor
            .start(hosts, search_hidden_hosts, hidden_host_ports)
            .await
    }

    pub async fn stop_monitoring(&self) {
        self.monitor.stop().await;
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_active()
    }

    pub fn monitor_statuses(&self) -> Vec<StatusChange> {
        self.monitor.statuses()
    }

    pub async fn shutdown(&self) {
        self.cancel_scan().await;
        self.monitor.stop().await;
        info!("application stopped");
    }
}
