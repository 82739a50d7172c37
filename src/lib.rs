//! svquery - concurrent A2S status queries for game servers.
//!
//! The engine fans out one UDP session per endpoint, caches successful
//! results for a short TTL and returns one result per endpoint in order.

pub mod a2s;
pub mod cache;
pub mod config;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod stats;
pub mod transport;

pub use cache::QueryCache;
pub use config::QueryConfig;
pub use endpoint::{Endpoint, EndpointKey, QueryResult};
pub use engine::QueryEngine;
pub use error::{ConfigError, EngineError, SessionError};
