//! Error types.

use std::io;
use thiserror::Error;

/// Why a single query session failed.
///
/// Never surfaced to engine callers; every variant becomes an offline
/// [`QueryResult`](crate::endpoint::QueryResult). Kept apart for stats and logs.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no reply before the deadline")]
    Timeout,

    #[error("network error: {0}")]
    Network(#[from] io::Error),

    #[error("could not resolve {0}")]
    Resolve(String),
}

/// Invalid endpoint configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("server '{name}' has empty address")]
    EmptyAddress { name: String },

    #[error("server '{name}' has invalid port: {port}")]
    InvalidPort { name: String, port: u32 },

    #[error("malformed endpoint '{0}', expected [name=]host:port")]
    Malformed(String),
}

/// Failure of a whole engine call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("endpoint #{index}: {source}")]
    InvalidEndpoint {
        index: usize,
        #[source]
        source: ConfigError,
    },
}
