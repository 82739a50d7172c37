//! Two-phase A2S handshake as an explicit state machine.
//!
//! No I/O happens here. The UDP driver feeds in replies and failures and
//! sends whatever datagrams the machine hands back.

use crate::a2s::{self, Reply, ServerInfo};
use crate::error::SessionError;

/// Where a session stands.
#[derive(Debug)]
pub enum SessionState {
    Idle,
    SentChallenge,
    AwaitingChallenge,
    SentInfoRequest,
    AwaitingInfo,
    Done(ServerInfo),
    Failed(SessionError),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done(_) | SessionState::Failed(_))
    }

    fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::SentChallenge => "sent-challenge",
            SessionState::AwaitingChallenge => "awaiting-challenge",
            SessionState::SentInfoRequest => "sent-info-request",
            SessionState::AwaitingInfo => "awaiting-info",
            SessionState::Done(_) => "done",
            SessionState::Failed(_) => "failed",
        }
    }
}

/// Handshake driven by a transport.
///
/// ```text
/// Idle -> SentChallenge -> AwaitingChallenge -> SentInfoRequest -> AwaitingInfo -> Done
///                                  \_____________ info reply ______________________/
/// any state -> Failed
/// ```
#[derive(Debug)]
pub struct Handshake {
    state: SessionState,
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Leave `Idle`, returning the challenge request to send.
    pub fn start(&mut self) -> Option<Vec<u8>> {
        match self.state {
            SessionState::Idle => {
                self.state = SessionState::SentChallenge;
                Some(a2s::encode_challenge_request())
            }
            _ => None,
        }
    }

    /// The datagram handed out last has left the socket.
    pub fn on_sent(&mut self) {
        self.state = match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::SentChallenge => SessionState::AwaitingChallenge,
            SessionState::SentInfoRequest => SessionState::AwaitingInfo,
            other => other,
        };
    }

    /// Feed a decoded reply. Returns the next datagram to send, if any.
    ///
    /// Unrecognized and out-of-sequence replies leave the state unchanged.
    pub fn on_reply(&mut self, reply: Reply) -> Option<Vec<u8>> {
        let awaiting_challenge = matches!(self.state, SessionState::AwaitingChallenge);
        let awaiting_info = matches!(self.state, SessionState::AwaitingInfo);

        match reply {
            Reply::Challenge(token) if awaiting_challenge => {
                self.state = SessionState::SentInfoRequest;
                Some(a2s::encode_info_request(token))
            }
            Reply::Info(info) if awaiting_challenge || awaiting_info => {
                self.state = SessionState::Done(info);
                None
            }
            _ => None,
        }
    }

    /// Fail from any non-terminal state.
    pub fn fail(&mut self, error: SessionError) {
        if !self.is_terminal() {
            self.state = SessionState::Failed(error);
        }
    }

    /// Consume the handshake. A non-terminal handshake counts as timed out.
    pub fn finish(self) -> Result<ServerInfo, SessionError> {
        match self.state {
            SessionState::Done(info) => Ok(info),
            SessionState::Failed(error) => Err(error),
            _ => Err(SessionError::Timeout),
        }
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}
