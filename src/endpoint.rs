//! Endpoints and per-endpoint query results.

use std::fmt;
use std::str::FromStr;

use crate::a2s::ServerInfo;
use crate::error::ConfigError;

const DEFAULT_NAME: &str = "Server";

/// A remote server to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Display name, not part of the identity.
    pub name: String,
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
        }
    }

    /// Cache identity: address (case-insensitive) and port.
    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            address: self.address.to_lowercase(),
            port: self.port,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::EmptyAddress {
                name: self.name.clone(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort {
                name: self.name.clone(),
                port: 0,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.contains(':') {
            write!(f, "[{}]:{}", self.address, self.port)
        } else {
            write!(f, "{}:{}", self.address, self.port)
        }
    }
}

/// Parses `[name=]host:port`; IPv6 hosts go in brackets.
impl FromStr for Endpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::Malformed(s.to_string());

        let (name, target) = match s.split_once('=') {
            Some((name, target)) if !name.trim().is_empty() => (name.trim(), target.trim()),
            Some((_, target)) => (DEFAULT_NAME, target.trim()),
            None => (DEFAULT_NAME, s.trim()),
        };

        let (host, port) = match target.strip_prefix('[') {
            Some(bracketed) => bracketed.split_once("]:").ok_or_else(malformed)?,
            None => target.rsplit_once(':').ok_or_else(malformed)?,
        };
        if host.contains(['[', ']']) || (host.contains(':') && !target.starts_with('[')) {
            return Err(malformed());
        }

        let port: u32 = port.parse().map_err(|_| malformed())?;
        let port = u16::try_from(port)
            .ok()
            .filter(|&p| p != 0)
            .ok_or_else(|| ConfigError::InvalidPort {
                name: name.to_string(),
                port,
            })?;

        let endpoint = Endpoint::new(name, host, port);
        endpoint.validate()?;
        Ok(endpoint)
    }
}

/// Identity of an endpoint for caching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub address: String,
    pub port: u16,
}

/// Live status of one endpoint.
///
/// When `ok` is false every other field is zero or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub ok: bool,
    pub map: String,
    pub players: u8,
    pub max_players: u8,
    pub bots: u8,
}

impl QueryResult {
    pub fn offline() -> Self {
        Self::default()
    }
}

/// Server-reported values pass through unchanged.
impl From<ServerInfo> for QueryResult {
    fn from(info: ServerInfo) -> Self {
        Self {
            ok: true,
            map: info.map,
            players: info.players,
            max_players: info.max_players,
            bots: info.bots,
        }
    }
}
