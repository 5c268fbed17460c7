use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::addr::AddressRange;
use crate::arp::{self, ArpResolver};
use crate::classify::classify;
use crate::config::Config;
use crate::error::ScanError;
use crate::events::{EventSink, NetEvent};
use crate::history::HistoryStore;
use crate::hostname::{HostnameResolver, ReverseDns};
use crate::pool::WorkerPool;
use crate::portscan::PortScanner;
use crate::probe::{EchoProbe, LivenessProbe, Probe};
use crate::types::{Host, ScanRequest};
use crate::vendor::{OuiVendors, VendorLookup};

/// Lifecycle of one range scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Validating,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// What a finished scan did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Addresses handed to a worker.
    pub dispatched: u64,
    pub found: u64,
    /// `Completed` or `Cancelled`.
    pub state: ScanState,
}

/// Sweeps an inclusive IPv4 range: liveness, then ports, names and
/// classification for every host that answers.
///
/// Every run ends with exactly one `scanComplete`, published after the last
/// worker has finished.
pub struct RangeScanner {
    concurrency: usize,
    default_ports: Vec<u16>,
    hidden_timeout: Duration,
    port_scanner: PortScanner,
    echo: Arc<dyn Probe>,
    hostnames: Arc<dyn HostnameResolver>,
    arp: Arc<dyn ArpResolver>,
    vendors: Arc<dyn VendorLookup>,
    history: Option<Arc<dyn HistoryStore>>,
    sink: Arc<dyn EventSink>,
}

impl RangeScanner {
    /// Scanner wired to the real network and the platform's resolvers.
    pub fn new(config: &Config, sink: Arc<dyn EventSink>) -> Self {
        Self {
            concurrency: config.concurrency,
            default_ports: config.default_ports.clone(),
            hidden_timeout: config.hidden_probe_timeout(),
            port_scanner: PortScanner::new(config.port_timeout()),
            echo: Arc::new(EchoProbe::new(config.echo_timeout())),
            hostnames: Arc::new(ReverseDns::new(config.dns_timeout())),
            arp: arp::system_resolver(config.arp_timeout()),
            vendors: Arc::new(OuiVendors),
            history: None,
            sink,
        }
    }

    pub fn with_echo_probe(mut self, echo: Arc<dyn Probe>) -> Self {
        self.echo = echo;
        self
    }

    pub fn with_hostname_resolver(mut self, hostnames: Arc<dyn HostnameResolver>) -> Self {
        self.hostnames = hostnames;
        self
    }

    pub fn with_arp_resolver(mut self, arp: Arc<dyn ArpResolver>) -> Self {
        self.arp = arp;
        self
    }

    pub fn with_vendor_lookup(mut self, vendors: Arc<dyn VendorLookup>) -> Self {
        self.vendors = vendors;
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    /// Validate `request` and, if it is acceptable, run the sweep in the
    /// background. A rejected request has already been reported to the sink.
    pub fn start(
        self: &Arc<Self>,
        request: ScanRequest,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<ScanSummary>, ScanError> {
        let accepted = self.accept(request)?;
        let scanner = Arc::clone(self);
        Ok(tokio::spawn(async move { scanner.sweep(accepted, cancel).await }))
    }

    /// Validate and sweep in the caller's task.
    pub async fn run(
        &self,
        request: ScanRequest,
        cancel: CancellationToken,
    ) -> Result<ScanSummary, ScanError> {
        let accepted = self.accept(request)?;
        Ok(self.sweep(accepted, cancel).await)
    }

    /// Check a request before any probing. On rejection the sink gets one
    /// `scanError` followed by `scanComplete(false)`.
    pub fn accept(&self, request: ScanRequest) -> Result<AcceptedScan, ScanError> {
        match self.validate(&request) {
            Ok(range) => Ok(AcceptedScan { range, request }),
            Err(e) => {
                warn!("scan rejected: {e}");
                self.sink.publish(NetEvent::ScanError(e.to_string()));
                self.sink.publish(NetEvent::ScanComplete(false));
                Err(e)
            }
        }
    }

    fn validate(&self, request: &ScanRequest) -> Result<AddressRange, ScanError> {
        if request.start_ip.trim().is_empty() || request.end_ip.trim().is_empty() {
            return Err(ScanError::MissingAddress);
        }
        if let Some(history) = &self.history {
            history.record(request);
        }
        AddressRange::parse(&request.start_ip, &request.end_ip)
    }

    /// Probe every address of an accepted scan. Cancellation is checked
    /// before each address is handed out; workers already running finish on
    /// their own timeouts.
    pub async fn sweep(&self, accepted: AcceptedScan, cancel: CancellationToken) -> ScanSummary {
        let AcceptedScan { range, request } = accepted;
        let ports = if request.ports.is_empty() {
            self.default_ports.clone()
        } else {
            request.ports.clone()
        };
        info!(
            "scanning {} - {} ({} addresses, ports {:?}, hidden hosts: {})",
            range.start(),
            range.end(),
            range.len(),
            ports,
            request.search_hidden_hosts
        );

        let worker = Arc::new(Worker {
            liveness: LivenessProbe::layered(
                self.echo.clone(),
                request.search_hidden_hosts,
                &request.hidden_host_ports,
                self.hidden_timeout,
            ),
            ports,
            port_scanner: self.port_scanner,
            hostnames: self.hostnames.clone(),
            arp: self.arp.clone(),
            vendors: self.vendors.clone(),
            sink: self.sink.clone(),
            found: AtomicU64::new(0),
        });

        let mut pool = WorkerPool::new(self.concurrency);
        let mut dispatched = 0u64;
        let mut cancelled = false;
        for addr in range.iter() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let job = {
                let worker = worker.clone();
                async move { worker.discover(addr).await }
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                _ = pool.spawn(job) => dispatched += 1,
            }
        }
        if cancelled {
            info!("scan cancelled after dispatching {dispatched} addresses");
        }
        pool.drain().await;

        let found = worker.found.load(Ordering::Relaxed);
        let state = if cancelled {
            ScanState::Cancelled
        } else {
            ScanState::Completed
        };
        info!("scan finished: {found} hosts up, {dispatched} probed");
        self.sink.publish(NetEvent::ScanComplete(!cancelled));
        ScanSummary {
            dispatched,
            found,
            state,
        }
    }
}

/// A request that passed validation, ready to sweep.
#[derive(Debug, Clone)]
pub struct AcceptedScan {
    range: AddressRange,
    request: ScanRequest,
}

impl AcceptedScan {
    pub fn range(&self) -> AddressRange {
        self.range
    }
}

/// Per-scan state shared by all address workers.
struct Worker {
    liveness: LivenessProbe,
    ports: Vec<u16>,
    port_scanner: PortScanner,
    hostnames: Arc<dyn HostnameResolver>,
    arp: Arc<dyn ArpResolver>,
    vendors: Arc<dyn VendorLookup>,
    sink: Arc<dyn EventSink>,
    found: AtomicU64,
}

impl Worker {
    async fn discover(&self, addr: Ipv4Addr) {
        let live = self.liveness.check(addr).await;
        if !live.alive {
            debug!("{addr} down");
            return;
        }

        let open_ports = self.port_scanner.scan(addr, &self.ports).await;
        let hostname = self.hostnames.resolve(addr).await;
        let mac_address = self.arp.resolve(addr).await;
        let vendor = mac_address.as_deref().and_then(|mac| self.vendors.lookup(mac));
        let device_type = classify(
            addr,
            hostname.as_deref().unwrap_or_default(),
            vendor.as_deref().unwrap_or_default(),
            &open_ports,
        );

        let host = Host {
            ip_address: addr,
            hostname,
            mac_address,
            vendor,
            os: None,
            open_ports,
            device_type,
            rtt_ms: live.rtt.map(|rtt| rtt.as_millis() as u64),
        };
        info!(
            "host up: {} ({}) ports {:?}",
            host.ip_address, host.device_type, host.open_ports
        );
        self.found.fetch_add(1, Ordering::Relaxed);
        self.sink.publish(NetEvent::HostFound(host));
    }
}
