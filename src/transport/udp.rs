//! UDP driver for one query session.
//!
//! Each session binds its own ephemeral socket, connects it to the target
//! and runs the handshake until it finishes or the deadline passes. The
//! socket is dropped with the session on every path.

use log::trace;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{UdpSocket, lookup_host};
use tokio::time::{Instant, timeout_at};

use crate::a2s::{self, Fragment, Reassembly, Reply, SPLIT_MARKER, ServerInfo};
use crate::endpoint::Endpoint;
use crate::error::SessionError;

use super::MAX_PACKET_SIZE;
use super::session::Handshake;

/// One outbound query against one server.
pub struct UdpSession {
    socket: UdpSocket,
    target: SocketAddr,
    deadline: Instant,
    handshake: Handshake,
    fragments: Vec<Fragment>,
}

impl UdpSession {
    /// Resolve `address` and open a session to it.
    ///
    /// Name resolution counts against the deadline.
    pub async fn connect(
        address: &str,
        port: u16,
        deadline: Instant,
    ) -> Result<Self, SessionError> {
        let resolve_error =
            |detail: String| SessionError::Resolve(format!("{}:{} ({})", address, port, detail));

        let mut addrs = match timeout_at(deadline, lookup_host((address, port))).await {
            Err(_) => return Err(SessionError::Timeout),
            Ok(Err(e)) => return Err(resolve_error(e.to_string())),
            Ok(Ok(addrs)) => addrs,
        };
        let target = addrs
            .next()
            .ok_or_else(|| resolve_error("no addresses".to_string()))?;

        Self::bind(target, deadline).await
    }

    /// Open a session to an already resolved address.
    pub async fn bind(target: SocketAddr, deadline: Instant) -> Result<Self, SessionError> {
        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;

        Ok(Self {
            socket,
            target,
            deadline,
            handshake: Handshake::new(),
            fragments: Vec::new(),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Drive the handshake to a terminal state.
    pub async fn run(mut self) -> Result<ServerInfo, SessionError> {
        if let Some(request) = self.handshake.start() {
            self.send(&request).await;
        }

        let mut buf = [0u8; MAX_PACKET_SIZE];

        while !self.handshake.is_terminal() {
            let received = timeout_at(self.deadline, self.socket.recv_from(&mut buf)).await;
            let (len, src) = match received {
                Err(_) => {
                    self.handshake.fail(SessionError::Timeout);
                    break;
                }
                Ok(Err(e)) => {
                    self.handshake.fail(SessionError::Network(e));
                    break;
                }
                Ok(Ok(r)) => r,
            };

            if src != self.target {
                trace!("{}: dropped datagram from {}", self.target, src);
                continue;
            }

            let reply = self.classify(&buf[..len]);
            if matches!(reply, Reply::Unrecognized) {
                trace!(
                    "{}: ignored {} byte datagram while {}",
                    self.target,
                    len,
                    self.handshake.state_name()
                );
            }

            if let Some(next) = self.handshake.on_reply(reply) {
                self.send(&next).await;
            }
        }

        self.handshake.finish()
    }

    async fn send(&mut self, datagram: &[u8]) {
        match self.socket.send(datagram).await {
            Ok(_) => self.handshake.on_sent(),
            Err(e) => self.handshake.fail(SessionError::Network(e)),
        }
    }

    /// Decode a datagram, buffering split replies until they are whole.
    fn classify(&mut self, datagram: &[u8]) -> Reply {
        if !datagram.starts_with(&SPLIT_MARKER) {
            return a2s::decode(datagram);
        }

        let Some(fragment) = Fragment::parse(datagram) else {
            return Reply::Unrecognized;
        };

        // A new id means the server abandoned the previous reply.
        if self.fragments.first().is_some_and(|f| f.id != fragment.id) {
            self.fragments.clear();
        }
        if self.fragments.iter().any(|f| f.index == fragment.index) {
            return Reply::Unrecognized;
        }
        self.fragments.push(fragment);

        match a2s::reassemble(&self.fragments) {
            Reassembly::Complete(payload) => {
                self.fragments.clear();
                a2s::decode(&payload)
            }
            Reassembly::Incomplete => Reply::Unrecognized,
        }
    }
}

/// Query one endpoint with a fresh session and a single time budget.
pub async fn query(endpoint: &Endpoint, timeout: Duration) -> Result<ServerInfo, SessionError> {
    let deadline = Instant::now() + timeout;
    let session = UdpSession::connect(&endpoint.address, endpoint.port, deadline).await?;
    session.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2s::ChallengeToken;

    async fn server() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    fn info() -> ServerInfo {
        ServerInfo {
            protocol: 17,
            name: "Test".to_string(),
            map: "cs_office".to_string(),
            folder: "csgo".to_string(),
            game: "Counter-Strike 2".to_string(),
            app_id: 730,
            players: 4,
            max_players: 16,
            bots: 1,
        }
    }

    #[tokio::test]
    async fn handshake_over_udp() {
        let (socket, addr) = server().await;
        let token = ChallengeToken([7, 7, 7, 7]);

        tokio::spawn(async move {
            let mut buf = [0u8; MAX_PACKET_SIZE];
            let (len, client) = socket.recv_from(&mut buf).await.unwrap();
            assert_eq!(a2s::parse_info_request(&buf[..len]), Some(ChallengeToken::NONE));
            socket
                .send_to(&a2s::encode_challenge_reply(token), client)
                .await
                .unwrap();

            let (len, client) = socket.recv_from(&mut buf).await.unwrap();
            assert_eq!(a2s::parse_info_request(&buf[..len]), Some(token));
            socket.send_to(&info().to_bytes(), client).await.unwrap();
        });

        let deadline = Instant::now() + Duration::from_secs(2);
        let session = UdpSession::bind(addr, deadline).await.unwrap();

        assert_eq!(session.run().await.unwrap(), info());
    }

    #[tokio::test]
    async fn garbage_then_reply() {
        let (socket, addr) = server().await;

        tokio::spawn(async move {
            let mut buf = [0u8; MAX_PACKET_SIZE];
            let (_, client) = socket.recv_from(&mut buf).await.unwrap();
            socket.send_to(b"\x00garbage", client).await.unwrap();
            socket.send_to(&[0xFF, 0xFF, 0xFF, 0xFF, 0x6C], client).await.unwrap();
            socket.send_to(&info().to_bytes(), client).await.unwrap();
        });

        let deadline = Instant::now() + Duration::from_secs(2);
        let session = UdpSession::bind(addr, deadline).await.unwrap();

        assert_eq!(session.run().await.unwrap(), info());
    }

    #[tokio::test]
    async fn split_reply_is_reassembled() {
        let (socket, addr) = server().await;

        tokio::spawn(async move {
            let mut buf = [0u8; MAX_PACKET_SIZE];
            let (_, client) = socket.recv_from(&mut buf).await.unwrap();

            let payload = info().to_bytes();
            let chunks: Vec<_> = payload.chunks(24).collect();
            for (i, chunk) in chunks.iter().enumerate().rev() {
                let fragment = Fragment {
                    id: 99,
                    total: chunks.len() as u8,
                    index: i as u8,
                    payload: chunk.to_vec(),
                };
                socket.send_to(&fragment.to_bytes(), client).await.unwrap();
            }
        });

        let deadline = Instant::now() + Duration::from_secs(2);
        let session = UdpSession::bind(addr, deadline).await.unwrap();

        assert_eq!(session.run().await.unwrap(), info());
    }

    #[tokio::test]
    async fn incomplete_split_reply_times_out() {
        let (socket, addr) = server().await;

        tokio::spawn(async move {
            let mut buf = [0u8; MAX_PACKET_SIZE];
            let (_, client) = socket.recv_from(&mut buf).await.unwrap();
            let fragment = Fragment {
                id: 3,
                total: 2,
                index: 0,
                payload: info().to_bytes(),
            };
            socket.send_to(&fragment.to_bytes(), client).await.unwrap();
            // Keep the socket open so the client sees silence, not a refusal.
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let deadline = Instant::now() + Duration::from_millis(200);
        let session = UdpSession::bind(addr, deadline).await.unwrap();

        assert!(matches!(session.run().await, Err(SessionError::Timeout)));
    }

    #[tokio::test]
    async fn silent_server_times_out_within_budget() {
        let (_socket, addr) = server().await;
        let timeout = Duration::from_millis(200);

        let start = Instant::now();
        let session = UdpSession::bind(addr, start + timeout).await.unwrap();
        let result = session.run().await;

        assert!(matches!(result, Err(SessionError::Timeout)));
        assert!(start.elapsed() < timeout + Duration::from_millis(150));
    }

    #[tokio::test]
    async fn new_split_id_discards_partial_reply() {
        let (socket, addr) = server().await;

        tokio::spawn(async move {
            let mut buf = [0u8; MAX_PACKET_SIZE];
            let (_, client) = socket.recv_from(&mut buf).await.unwrap();

            // Half of a reply the server then abandons.
            let stale = Fragment {
                id: 1,
                total: 2,
                index: 0,
                payload: b"stale bytes".to_vec(),
            };
            socket.send_to(&stale.to_bytes(), client).await.unwrap();

            let payload = info().to_bytes();
            let (head, tail) = payload.split_at(payload.len() / 2);
            for (index, chunk) in [(1, tail), (0, head)] {
                let fragment = Fragment {
                    id: 2,
                    total: 2,
                    index,
                    payload: chunk.to_vec(),
                };
                socket.send_to(&fragment.to_bytes(), client).await.unwrap();
            }
        });

        let deadline = Instant::now() + Duration::from_secs(2);
        let session = UdpSession::bind(addr, deadline).await.unwrap();

        assert_eq!(session.run().await.unwrap(), info());
    }

    #[tokio::test]
    async fn repeated_fragment_is_buffered_once() {
        let (_socket, addr) = server().await;
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut session = UdpSession::bind(addr, deadline).await.unwrap();
        let fragment = Fragment {
            id: 5,
            total: 2,
            index: 0,
            payload: info().to_bytes(),
        }
        .to_bytes();

        for _ in 0..100 {
            assert!(matches!(session.classify(&fragment), Reply::Unrecognized));
        }

        assert_eq!(session.fragments.len(), 1);
    }

    #[tokio::test]
    async fn challenge_and_info_share_one_budget() {
        let (socket, addr) = server().await;
        let token = ChallengeToken([1, 2, 3, 4]);
        let phase_delay = Duration::from_millis(250);
        let timeout = Duration::from_millis(400);

        // Each phase fits the budget on its own, both together do not.
        tokio::spawn(async move {
            let mut buf = [0u8; MAX_PACKET_SIZE];
            let (_, client) = socket.recv_from(&mut buf).await.unwrap();
            tokio::time::sleep(phase_delay).await;
            let _ = socket
                .send_to(&a2s::encode_challenge_reply(token), client)
                .await;

            let (_, client) = socket.recv_from(&mut buf).await.unwrap();
            tokio::time::sleep(phase_delay).await;
            let _ = socket.send_to(&info().to_bytes(), client).await;
        });

        let start = Instant::now();
        let session = UdpSession::bind(addr, start + timeout).await.unwrap();
        let result = session.run().await;
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(SessionError::Timeout)));
        assert!(elapsed >= Duration::from_millis(380), "elapsed {:?}", elapsed);
        assert!(elapsed < timeout + Duration::from_millis(150), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn junk_does_not_extend_deadline() {
        let (socket, addr) = server().await;
        let timeout = Duration::from_millis(300);

        tokio::spawn(async move {
            let mut buf = [0u8; MAX_PACKET_SIZE];
            let (_, client) = socket.recv_from(&mut buf).await.unwrap();
            for _ in 0..100 {
                let _ = socket.send_to(b"junk", client).await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        });

        let start = Instant::now();
        let session = UdpSession::bind(addr, start + timeout).await.unwrap();
        let result = session.run().await;
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(SessionError::Timeout)));
        assert!(elapsed < timeout + Duration::from_millis(150), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn unresolvable_host_fails() {
        let deadline = Instant::now() + Duration::from_secs(2);

        let result = UdpSession::connect("host.invalid", 27015, deadline).await;

        assert!(result.is_err());
    }
}
