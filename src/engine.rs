//! Query engine façade.
//!
//! Handles the per-call pipeline:
//! 1. Validate the endpoint list
//! 2. Answer fresh endpoints from the cache
//! 3. Fan out one UDP session per cache miss, all concurrently
//! 4. Write successes back to the cache and return results in input order
//!
//! Sessions own the I/O, the engine owns the decisions.

use futures::future::join_all;
use log::debug;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::QueryCache;
use crate::config::QueryConfig;
use crate::endpoint::{Endpoint, QueryResult};
use crate::error::EngineError;
use crate::stats::{Stats, StatsSnapshot};
use crate::transport::udp;

/// Queries a set of servers, one result per endpoint.
pub struct QueryEngine {
    config: QueryConfig,
    cache: Arc<QueryCache>,
    stats: Stats,
}

impl QueryEngine {
    /// Create an engine with its own cache sized from `config.cache_ttl`.
    pub fn new(config: QueryConfig) -> Self {
        let cache = Arc::new(QueryCache::new(config.cache_ttl));
        Self::with_cache(config, cache)
    }

    /// Create an engine around an existing cache.
    ///
    /// The cache's own TTL applies; `config.cache_ttl` is not consulted.
    pub fn with_cache(config: QueryConfig, cache: Arc<QueryCache>) -> Self {
        Self {
            config,
            cache,
            stats: Stats::new(),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Query every endpoint concurrently.
    ///
    /// Waits for every session to finish or time out, so the call takes at
    /// most about one timeout no matter how many endpoints there are.
    /// Unreachable servers come back as [`QueryResult::offline`]; the call
    /// itself only fails on an invalid endpoint.
    pub async fn query_all(&self, endpoints: &[Endpoint]) -> Result<Vec<QueryResult>, EngineError> {
        for (index, endpoint) in endpoints.iter().enumerate() {
            endpoint
                .validate()
                .map_err(|source| EngineError::InvalidEndpoint { index, source })?;
        }

        Ok(join_all(endpoints.iter().map(|endpoint| self.resolve(endpoint))).await)
    }

    /// Query a single endpoint.
    pub async fn query(&self, endpoint: &Endpoint) -> Result<QueryResult, EngineError> {
        let mut results = self.query_all(std::slice::from_ref(endpoint)).await?;
        Ok(results.pop().unwrap_or_else(QueryResult::offline))
    }

    async fn resolve(&self, endpoint: &Endpoint) -> QueryResult {
        let key = endpoint.key();

        if let Some(result) = self.cache.get(&key) {
            self.stats.record_cached();
            debug!("{} ({}) CACHED map={}", endpoint.name, endpoint, result.map);
            return result;
        }

        let start = Instant::now();
        match udp::query(endpoint, self.config.timeout).await {
            Ok(info) => {
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                let result = QueryResult::from(info);
                self.cache.put(&key, &result);
                self.stats.record_succeeded(elapsed_ms);
                debug!(
                    "{} ({}) ONLINE map={} players={}/{} bots={} total={:.3}ms",
                    endpoint.name,
                    endpoint,
                    result.map,
                    result.players,
                    result.max_players,
                    result.bots,
                    elapsed_ms
                );
                result
            }
            Err(e) => {
                self.stats.record_failed(&e);
                debug!(
                    "{} ({}) OFFLINE {} after {:.3}ms",
                    endpoint.name,
                    endpoint,
                    e,
                    start.elapsed().as_secs_f64() * 1000.0
                );
                QueryResult::offline()
            }
        }
    }

    /// Number of cached endpoints, expired ones included.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn stats_snapshot_and_reset(&self) -> StatsSnapshot {
        self.stats.snapshot_and_reset()
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(QueryConfig::default())
    }
}
