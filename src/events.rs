//! Notifications delivered to whatever front end is attached.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::types::{Host, StatusChange};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum NetEvent {
    HostFound(Host),
    /// Only ever sent for a rejected scan request.
    ScanError(String),
    /// Exactly one per scan, always last: `true` when the range was exhausted.
    ScanComplete(bool),
    HostStatusUpdate(StatusChange),
}

/// Where the scanner and monitor publish their notifications.
///
/// `publish` is called from worker tasks and must not block for long.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: NetEvent);
}

impl<F> EventSink for F
where
    F: Fn(NetEvent) + Send + Sync,
{
    fn publish(&self, event: NetEvent) {
        self(event)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Sequenced {
    pub seq: u64,
    #[serde(flatten)]
    pub event: NetEvent,
}

/// Bounded in-memory event buffer for polling clients.
///
/// Sequence numbers start at 1 and never repeat; once the buffer is full the
/// oldest events are dropped.
pub struct EventLog {
    capacity: usize,
    inner: Mutex<LogInner>,
}

struct LogInner {
    last_seq: u64,
    events: VecDeque<Sequenced>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(LogInner {
                last_seq: 0,
                events: VecDeque::new(),
            }),
        }
    }

    /// Buffered events with a sequence number greater than `after`.
    pub fn since(&self, after: u64) -> Vec<Sequenced> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .events
            .iter()
            .filter(|e| e.seq > after)
            .cloned()
            .collect()
    }

    pub fn last_seq(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_seq
    }
}

impl EventSink for EventLog {
    fn publish(&self, event: NetEvent) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.last_seq += 1;
        let seq = inner.last_seq;
        inner.events.push_back(Sequenced { seq, event });
        while inner.events.len() > self.capacity {
            inner.events.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_is_bounded_and_sequenced() {
        let log = EventLog::new(2);
        log.publish(NetEvent::ScanError("a".into()));
        log.publish(NetEvent::ScanComplete(false));
        log.publish(NetEvent::ScanComplete(true));

        let all = log.since(0);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].seq, 2);
        assert_eq!(all[1].event, NetEvent::ScanComplete(true));
        assert_eq!(log.last_seq(), 3);
        assert!(log.since(3).is_empty());
    }

    #[test]
    fn events_serialize_with_name_and_payload() {
        let v = serde_json::to_value(Sequenced {
            seq: 7,
            event: NetEvent::ScanComplete(true),
        })
        .unwrap();
        assert_eq!(v, serde_json::json!({"seq": 7, "event": "scanComplete", "data": true}));
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Mutex::new(Vec::new());
        let sink = |e: NetEvent| seen.lock().unwrap().push(e);
        sink.publish(NetEvent::ScanComplete(true));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
