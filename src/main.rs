use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use netview_rs::app::App;
use netview_rs::config::Config;
use netview_rs::events::{EventLog, EventSink, NetEvent};
use netview_rs::server::{self, AppState};
use netview_rs::types::{Host, ScanRequest};
use netview_rs::{logging, netdetect, ports};

/// netview: discover live hosts on an IPv4 range, probe their ports, guess
/// what they are and watch them go on and offline.
#[derive(Debug, Clone, Parser)]
#[command(name = "netview", version, long_about = None)]
struct Cli {
    /// JSON config file; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// First address of the range. With --end omitted too, the local /24 is scanned.
    #[arg(long)]
    start: Option<String>,

    /// Last address of the range (inclusive).
    #[arg(long)]
    end: Option<String>,

    /// Ports to probe on live hosts, e.g. "22,80,8000-8010" or "@ports.txt".
    #[arg(long)]
    ports: Option<String>,

    /// Also try TCP connects on hosts that ignore ping.
    #[arg(long, default_value_t = false)]
    hidden: bool,

    /// Ports used for the hidden-host check (same syntax as --ports).
    #[arg(long = "hidden-ports")]
    hidden_ports: Option<String>,

    /// Addresses probed at the same time.
    #[arg(long)]
    concurrency: Option<usize>,

    /// After the scan, keep watching the hosts found until Ctrl+C.
    #[arg(long, default_value_t = false)]
    monitor: bool,

    /// Write discovered hosts as pretty JSON to this path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Run the HTTP API instead of a one-shot scan.
    #[arg(long, default_value_t = false)]
    serve: bool,

    /// Address the HTTP API listens on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = match cli.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(c) = cli.concurrency {
        config.concurrency = c;
    }

    let events = Arc::new(EventLog::new(1024));
    let sink: Arc<dyn EventSink> = {
        let events = events.clone();
        Arc::new(move |event: NetEvent| {
            if let NetEvent::HostStatusUpdate(change) = &event {
                println!(
                    "{:<15}  {}",
                    change.ip_address,
                    if change.is_online { "online" } else { "offline" }
                );
            }
            events.publish(event);
        })
    };
    let app = Arc::new(App::new(&config, sink));
    app.startup();

    if cli.serve {
        let state = AppState {
            app: app.clone(),
            events,
        };
        println!("Press Ctrl+C to stop the server...");
        server::serve(&cli.bind, state, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
        app.shutdown().await;
        return Ok(());
    }

    let request = build_request(&cli)?;
    println!(
        "Scanning {} - {} (concurrency {})",
        request.start_ip, request.end_ip, config.concurrency
    );
    app.scan(request).await?;

    let finished = tokio::select! {
        summary = app.wait_for_scan() => Some(summary),
        _ = tokio::signal::ctrl_c() => None,
    };
    if finished.is_none() {
        warn!("interrupted, cancelling scan");
        app.cancel_scan().await;
    }

    let hosts = app.hosts();
    print_hosts_table(&hosts);
    if let Some(path) = cli.output.as_deref() {
        match write_hosts_json(path, &hosts) {
            Ok(()) => println!("Wrote JSON results to {}", path.display()),
            Err(e) => eprintln!("Failed to write JSON to {}: {e:#}", path.display()),
        }
    }

    if cli.monitor && finished.is_some() {
        if hosts.is_empty() {
            println!("No hosts to monitor.");
        } else {
            let hidden_ports = parse_ports_flag(cli.hidden_ports.as_deref())?;
            app.start_monitoring(None, cli.hidden, hidden_ports).await?;
            println!(
                "Monitoring {} hosts every {:?}. Press Ctrl+C to stop...",
                hosts.len(),
                config.monitor_interval()
            );
            let _ = tokio::signal::ctrl_c().await;
        }
    }

    app.shutdown().await;
    info!("done");
    Ok(())
}

fn build_request(cli: &Cli) -> Result<ScanRequest> {
    let (start, end) = match (cli.start.as_deref(), cli.end.as_deref()) {
        (Some(start), Some(end)) => (start.to_string(), end.to_string()),
        (None, None) => {
            let range = netdetect::default_scan_range()
                .context("no --start/--end given and local network detection failed")?;
            (range.start().to_string(), range.end().to_string())
        }
        _ => bail!("--start and --end must be given together"),
    };

    let mut request = ScanRequest::new(start, end).ports(parse_ports_flag(cli.ports.as_deref())?);
    if cli.hidden {
        request = request.hidden_hosts(parse_ports_flag(cli.hidden_ports.as_deref())?);
    }
    Ok(request)
}

fn parse_ports_flag(arg: Option<&str>) -> Result<Vec<u16>> {
    match arg {
        Some(arg) => ports::parse_port_arg(arg),
        None => Ok(Vec::new()),
    }
}

fn print_hosts_table(hosts: &[Host]) {
    let mut ip_w = "ip".len();
    let mut name_w = "hostname".len();
    let mut mac_w = "mac".len();
    let mut vendor_w = "vendor".len();
    let mut kind_w = "type".len();
    for h in hosts {
        ip_w = ip_w.max(h.ip_address.to_string().len());
        name_w = name_w.max(h.hostname.as_deref().map_or(1, str::len).min(40));
        mac_w = mac_w.max(h.mac_address.as_deref().map_or(1, str::len));
        vendor_w = vendor_w.max(h.vendor.as_deref().map_or(1, str::len).min(30));
        kind_w = kind_w.max(h.device_type.as_str().len());
    }
    let rtt_w = "rtt_ms".len();

    println!("\nHosts up: {}", hosts.len());
    println!(
        "{:<ip_w$}  {:<name_w$}  {:<mac_w$}  {:<vendor_w$}  {:<kind_w$}  {:>rtt_w$}  ports",
        "ip", "hostname", "mac", "vendor", "type", "rtt_ms"
    );
    println!(
        "{:-<ip_w$}  {:-<name_w$}  {:-<mac_w$}  {:-<vendor_w$}  {:-<kind_w$}  {:-<rtt_w$}  -----",
        "", "", "", "", "", ""
    );
    for h in hosts {
        let ports = h
            .open_ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{:<ip_w$}  {:<name_w$}  {:<mac_w$}  {:<vendor_w$}  {:<kind_w$}  {:>rtt_w$}  {}",
            h.ip_address.to_string(),
            truncate(h.hostname.as_deref().unwrap_or("-"), 40),
            h.mac_address.as_deref().unwrap_or("-"),
            truncate(h.vendor.as_deref().unwrap_or("-"), 30),
            h.device_type.as_str(),
            h.rtt_ms.map_or_else(|| "-".to_string(), |ms| ms.to_string()),
            ports,
        );
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn write_hosts_json(path: &Path, hosts: &[Host]) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, hosts)?;
    Ok(())
}
