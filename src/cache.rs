//! Query result cache with TTL-based freshness.

use rustc_hash::FxHashMap;
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::Instant;

use crate::endpoint::{EndpointKey, QueryResult};

struct CacheEntry {
    result: QueryResult,
    obtained_at: Instant,
}

/// TTL-based cache of successful query results.
///
/// Expired entries are not swept; they stay until the next successful query
/// for the same endpoint overwrites them. Callers always get clones.
pub struct QueryCache {
    entries: RwLock<FxHashMap<EndpointKey, CacheEntry>>,
    ttl: Duration,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            ttl,
        }
    }

    /// A cache that never hits.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a fresh result (age at most `ttl`).
    pub fn get(&self, key: &EndpointKey) -> Option<QueryResult> {
        if !self.is_enabled() {
            return None;
        }

        let now = Instant::now();
        let Ok(entries) = self.entries.read() else {
            return None;
        };
        let entry = entries.get(key)?;

        if now.saturating_duration_since(entry.obtained_at) <= self.ttl {
            Some(entry.result.clone())
        } else {
            None
        }
    }

    /// Store a successful result, replacing any previous entry.
    ///
    /// Offline results are ignored so stale but valid data survives.
    pub fn put(&self, key: &EndpointKey, result: &QueryResult) {
        if !self.is_enabled() || !result.ok {
            return;
        }

        let Ok(mut entries) = self.entries.write() else {
            return;
        };

        entries.insert(
            key.clone(),
            CacheEntry {
                result: result.clone(),
                obtained_at: Instant::now(),
            },
        );
    }

    /// Number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::config::DEFAULT_CACHE_TTL_SECS))
    }
}
