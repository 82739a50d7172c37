//! Statistics tracking for the query engine.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::SessionError;

/// Atomic counters for query outcomes.
pub struct Stats {
    pub requests: AtomicU64,
    pub cached: AtomicU64,
    pub succeeded: AtomicU64,
    pub timeouts: AtomicU64,
    pub network_errors: AtomicU64,
    /// Cumulative network response time in microseconds for averaging.
    total_response_time_us: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            cached: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            network_errors: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
        }
    }

    pub fn record_cached(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.cached.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_succeeded(&self, response_time_ms: f64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add((response_time_ms * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn record_failed(&self, error: &SessionError) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        match error {
            SessionError::Timeout => self.timeouts.fetch_add(1, Ordering::Relaxed),
            SessionError::Network(_) | SessionError::Resolve(_) => {
                self.network_errors.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        let requests = self.requests.swap(0, Ordering::Relaxed);
        let cached = self.cached.swap(0, Ordering::Relaxed);
        let succeeded = self.succeeded.swap(0, Ordering::Relaxed);
        let timeouts = self.timeouts.swap(0, Ordering::Relaxed);
        let network_errors = self.network_errors.swap(0, Ordering::Relaxed);
        let total_us = self.total_response_time_us.swap(0, Ordering::Relaxed);

        let avg_response_ms = if succeeded > 0 {
            (total_us as f64 / succeeded as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            requests,
            cached,
            succeeded,
            timeouts,
            network_errors,
            avg_response_ms,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub cached: u64,
    pub succeeded: u64,
    pub timeouts: u64,
    pub network_errors: u64,
    /// Average over successful network queries only.
    pub avg_response_ms: f64,
}
