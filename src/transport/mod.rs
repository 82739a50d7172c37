//! Transport layer for server queries.
//!
//! `session` holds the protocol state machine, `udp` drives it over a
//! socket owned by exactly one query.

pub mod session;
pub mod udp;

/// Receive buffer size. A2S replies fit in 1400 bytes per datagram.
pub const MAX_PACKET_SIZE: usize = 4096;

pub use session::{Handshake, SessionState};
pub use udp::UdpSession;
