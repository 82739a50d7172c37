//! A2S_INFO message parsing and construction.
//!
//! Covers the two query phases (challenge, info) and split-packet
//! reassembly. Nothing here does I/O; malformed input never panics and
//! decodes to [`Reply::Unrecognized`] instead.

/// Leading marker of a single-datagram message (`-1` as i32).
pub const SINGLE_MARKER: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

/// Leading marker of one fragment of a split reply (`-2` as i32).
pub const SPLIT_MARKER: [u8; 4] = [0xFE, 0xFF, 0xFF, 0xFF];

const INFO_REQUEST: u8 = 0x54;
const CHALLENGE_REPLY: u8 = 0x41;
const INFO_REPLY: u8 = 0x49;

const INFO_PAYLOAD: &[u8] = b"Source Engine Query\0";

/// Marker + id + total + index + max packet size.
const SPLIT_HEADER_LEN: usize = 12;

/// Max packet size a Source server advertises in split headers.
pub const SPLIT_PACKET_SIZE: u16 = 1248;

/// High bit of a split id flags a bzip2 payload.
const COMPRESSED_FLAG: u32 = 0x8000_0000;

/// Opaque token handed out by a server in phase 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeToken(pub [u8; 4]);

impl ChallengeToken {
    /// Placeholder sent before the server has issued a token.
    pub const NONE: ChallengeToken = ChallengeToken([0xFF; 4]);
}

/// Server status fields carried by an info reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub protocol: u8,
    pub name: String,
    pub map: String,
    pub folder: String,
    pub game: String,
    pub app_id: u16,
    pub players: u8,
    pub max_players: u8,
    pub bots: u8,
}

impl ServerInfo {
    /// Encode as a server would answer an info request.
    ///
    /// Fields after `bots` are written with neutral values (dedicated,
    /// linux, public, unsecured, version "1.0.0.0", no extra data).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(64 + self.name.len() + self.map.len());

        data.extend_from_slice(&SINGLE_MARKER);
        data.push(INFO_REPLY);
        data.push(self.protocol);
        put_cstring(&mut data, &self.name);
        put_cstring(&mut data, &self.map);
        put_cstring(&mut data, &self.folder);
        put_cstring(&mut data, &self.game);
        data.extend_from_slice(&self.app_id.to_le_bytes());
        data.push(self.players);
        data.push(self.max_players);
        data.push(self.bots);
        data.extend_from_slice(b"dl"); // server type, environment
        data.push(0); // visibility
        data.push(0); // VAC
        put_cstring(&mut data, "1.0.0.0");
        data.push(0); // EDF

        data
    }
}

/// A decoded server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Challenge(ChallengeToken),
    Info(ServerInfo),
    /// Foreign, truncated or unsupported traffic.
    Unrecognized,
}

/// Build the phase-1 request (placeholder token).
pub fn encode_challenge_request() -> Vec<u8> {
    encode_info_request(ChallengeToken::NONE)
}

/// Build the phase-2 request carrying the server's token.
pub fn encode_info_request(token: ChallengeToken) -> Vec<u8> {
    let mut data = Vec::with_capacity(5 + INFO_PAYLOAD.len() + 4);
    data.extend_from_slice(&SINGLE_MARKER);
    data.push(INFO_REQUEST);
    data.extend_from_slice(INFO_PAYLOAD);
    data.extend_from_slice(&token.0);
    data
}

/// Build a challenge reply, as a server would send it.
pub fn encode_challenge_reply(token: ChallengeToken) -> Vec<u8> {
    let mut data = Vec::with_capacity(9);
    data.extend_from_slice(&SINGLE_MARKER);
    data.push(CHALLENGE_REPLY);
    data.extend_from_slice(&token.0);
    data
}

/// Pull the token out of a request, `None` if it is not an info request.
pub fn parse_info_request(data: &[u8]) -> Option<ChallengeToken> {
    let body = data.strip_prefix(&SINGLE_MARKER)?;
    let body = body.strip_prefix(&[INFO_REQUEST])?;
    let rest = body.strip_prefix(INFO_PAYLOAD)?;
    let token: [u8; 4] = rest.get(..4)?.try_into().ok()?;
    Some(ChallengeToken(token))
}

/// Decode a single (or reassembled) server message.
pub fn decode(data: &[u8]) -> Reply {
    let Some(body) = data.strip_prefix(&SINGLE_MARKER) else {
        return Reply::Unrecognized;
    };
    let Some((&kind, payload)) = body.split_first() else {
        return Reply::Unrecognized;
    };

    match kind {
        CHALLENGE_REPLY => match payload.get(..4) {
            Some(token) => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(token);
                Reply::Challenge(ChallengeToken(raw))
            }
            None => Reply::Unrecognized,
        },
        INFO_REPLY => decode_info(payload).map_or(Reply::Unrecognized, Reply::Info),
        _ => Reply::Unrecognized,
    }
}

fn decode_info(payload: &[u8]) -> Option<ServerInfo> {
    let mut reader = Reader::new(payload);

    let protocol = reader.u8()?;
    let name = reader.cstring()?;
    let map = reader.cstring()?;
    let folder = reader.cstring()?;
    let game = reader.cstring()?;
    let app_id = reader.u16_le()?;
    let players = reader.u8()?;
    let max_players = reader.u8()?;
    let bots = reader.u8()?;

    Some(ServerInfo {
        protocol,
        name,
        map,
        folder,
        game,
        app_id,
        players,
        max_players,
        bots,
    })
}

/// Cursor over a reply payload.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn u8(&mut self) -> Option<u8> {
        let b = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn u16_le(&mut self) -> Option<u16> {
        let bytes = self.data.get(self.pos..self.pos + 2)?;
        self.pos += 2;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Null-terminated string; invalid UTF-8 is replaced, a missing
    /// terminator is truncation.
    fn cstring(&mut self) -> Option<String> {
        let rest = self.data.get(self.pos..)?;
        let len = rest.iter().position(|&b| b == 0)?;
        self.pos += len + 1;
        Some(String::from_utf8_lossy(&rest[..len]).into_owned())
    }
}

fn put_cstring(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

/// One datagram of a split reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub id: u32,
    pub total: u8,
    pub index: u8,
    pub payload: Vec<u8>,
}

impl Fragment {
    /// Parse a split-reply datagram.
    ///
    /// Returns `None` for anything that is not a usable fragment, including
    /// compressed payloads.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < SPLIT_HEADER_LEN || data[..4] != SPLIT_MARKER {
            return None;
        }

        let id = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let total = data[8];
        let index = data[9];

        if id & COMPRESSED_FLAG != 0 || total == 0 || index >= total {
            return None;
        }

        Some(Self {
            id,
            total,
            index,
            payload: data[SPLIT_HEADER_LEN..].to_vec(),
        })
    }

    /// Encode as a server would send it.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(SPLIT_HEADER_LEN + self.payload.len());
        data.extend_from_slice(&SPLIT_MARKER);
        data.extend_from_slice(&self.id.to_le_bytes());
        data.push(self.total);
        data.push(self.index);
        data.extend_from_slice(&SPLIT_PACKET_SIZE.to_le_bytes());
        data.extend_from_slice(&self.payload);
        data
    }
}

/// Outcome of [`reassemble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reassembly {
    Complete(Vec<u8>),
    Incomplete,
}

/// Join the fragments of one split reply.
///
/// Complete once every index in `0..total` is present for the id of the
/// first fragment. Order does not matter; repeated indices are ignored and
/// fragments with a different id or total are skipped.
pub fn reassemble(fragments: &[Fragment]) -> Reassembly {
    let Some(first) = fragments.first() else {
        return Reassembly::Incomplete;
    };

    let mut slots: Vec<Option<&[u8]>> = vec![None; first.total as usize];
    for fragment in fragments {
        if fragment.id != first.id || fragment.total != first.total {
            continue;
        }
        if let Some(slot) = slots.get_mut(fragment.index as usize) {
            slot.get_or_insert(fragment.payload.as_slice());
        }
    }

    if slots.iter().any(Option::is_none) {
        return Reassembly::Incomplete;
    }

    Reassembly::Complete(slots.into_iter().flatten().flatten().copied().collect())
}
