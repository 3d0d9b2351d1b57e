//! Query statistics
//!
//! Counters are updated from the per-datagram tasks and logged periodically.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for the DNS responder
#[derive(Default)]
pub struct Stats {
    /// Start time for uptime calculation
    start_time: Option<Instant>,

    /// Datagrams received
    pub received: AtomicU64,

    /// Responses sent
    pub answered: AtomicU64,

    /// Datagrams that did not parse
    pub malformed: AtomicU64,

    /// Key queries with an undecodable label
    pub invalid_keys: AtomicU64,

    /// Messages with no question we answer
    pub unanswerable: AtomicU64,

    /// Responses that failed to serialize
    pub encoding_errors: AtomicU64,

    /// Responses the socket failed to send
    pub send_errors: AtomicU64,
}

/// Point-in-time copy of [`Stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub received: u64,
    pub answered: u64,
    pub malformed: u64,
    pub invalid_keys: u64,
    pub unanswerable: u64,
    pub encoding_errors: u64,
    pub send_errors: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.uptime_secs(),
            received: self.received.load(Ordering::Relaxed),
            answered: self.answered.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            invalid_keys: self.invalid_keys.load(Ordering::Relaxed),
            unanswerable: self.unanswerable.load(Ordering::Relaxed),
            encoding_errors: self.encoding_errors.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = Stats::new();
        Stats::inc(&stats.received);
        Stats::inc(&stats.received);
        Stats::inc(&stats.answered);

        let snap = stats.snapshot();
        assert_eq!(snap.received, 2);
        assert_eq!(snap.answered, 1);
        assert_eq!(snap.malformed, 0);

        let json = serde_json::to_value(snap).unwrap();
        assert_eq!(json["received"], 2);
    }
}
