use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use ::time::{format_description::well_known, OffsetDateTime};

use crate::types::{HistoryEntry, ScanRequest};

/// Remembers recently scanned ranges.
pub trait HistoryStore: Send + Sync {
    fn record(&self, request: &ScanRequest);

    /// Newest first.
    fn entries(&self) -> Vec<HistoryEntry>;
}

/// Keeps the most recent `capacity` ranges in memory.
///
/// Submitting the same start/end as the newest entry again is ignored.
pub struct MemoryHistory {
    capacity: usize,
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl MemoryHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity + 1)),
        }
    }
}

impl HistoryStore for MemoryHistory {
    fn record(&self, request: &ScanRequest) {
        if self.capacity == 0 || request.start_ip.is_empty() || request.end_ip.is_empty() {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(newest) = entries.front() {
            if newest.start_ip == request.start_ip && newest.end_ip == request.end_ip {
                return;
            }
        }
        entries.push_front(HistoryEntry {
            start_ip: request.start_ip.clone(),
            end_ip: request.end_ip.clone(),
            timestamp: now_rfc3339(),
        });
        entries.truncate(self.capacity);
    }

    fn entries(&self) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(start: &str, end: &str) -> ScanRequest {
        ScanRequest::new(start, end)
    }

    #[test]
    fn newest_first_and_bounded() {
        let h = MemoryHistory::new(3);
        for i in 1..=5 {
            h.record(&req(&format!("10.0.0.{i}"), "10.0.0.200"));
        }
        let starts: Vec<_> = h.entries().into_iter().map(|e| e.start_ip).collect();
        assert_eq!(starts, vec!["10.0.0.5", "10.0.0.4", "10.0.0.3"]);
    }

    #[test]
    fn adjacent_duplicate_is_suppressed_but_not_older_ones() {
        let h = MemoryHistory::new(10);
        h.record(&req("10.0.0.1", "10.0.0.9"));
        h.record(&req("10.0.0.1", "10.0.0.9"));
        assert_eq!(h.entries().len(), 1);
        h.record(&req("10.0.1.1", "10.0.1.9"));
        h.record(&req("10.0.0.1", "10.0.0.9"));
        assert_eq!(h.entries().len(), 3);
    }

    #[test]
    fn incomplete_requests_are_not_recorded() {
        let h = MemoryHistory::new(10);
        h.record(&req("", "10.0.0.9"));
        assert!(h.entries().is_empty());
    }

    #[test]
    fn timestamps_are_rfc3339() {
        let h = MemoryHistory::new(1);
        h.record(&req("10.0.0.1", "10.0.0.2"));
        let ts = &h.entries()[0].timestamp;
        assert!(OffsetDateTime::parse(ts, &well_known::Rfc3339).is_ok(), "{ts}");
    }
}
