//! Library crate for netview-rs: range scanning, host classification and
//! online/offline monitoring, plus the HTTP surface the binary serves.
pub mod addr;
pub mod app;
pub mod arp;
pub mod classify;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod hostname;
pub mod logging;
pub mod monitor;
pub mod netdetect;
pub mod pool;
pub mod ports;
pub mod portscan;
pub mod probe;
pub mod scanner;
pub mod server;
pub mod task;
pub mod types;
pub mod vendor;
