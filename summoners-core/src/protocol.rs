//! Peer message vocabulary.
//!
//! Three kinds of text travel between peers:
//!
//! ```text
//! get              request for the current snapshot
//! #<snapshot>      full state, see crate::codec
//! (x, y)           raw pointer coordinates of a click
//! ```

use std::fmt;

use derive_more::{Display, Error};

use crate::codec;
use crate::GameState;

/// Snapshot request token.
pub const GET: &str = "get";
/// Prefix marking a snapshot payload.
pub const SNAPSHOT_MARKER: char = '#';

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ProtocolError {
    #[display("malformed click token {token:?}")]
    ClickToken { token: String },
}

/// A parsed inbound or outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Get,
    /// Snapshot body, without the leading marker.
    Snapshot(String),
    Click { x: i32, y: i32 },
}

impl Message {
    /// Classify a raw payload.
    ///
    /// `get` is matched exactly; anything starting with `#` is a snapshot
    /// (its body is not validated here); everything else must be a click
    /// token.
    pub fn parse(payload: &str) -> Result<Message, ProtocolError> {
        if payload == GET {
            return Ok(Message::Get);
        }
        if let Some(body) = payload.strip_prefix(SNAPSHOT_MARKER) {
            return Ok(Message::Snapshot(body.to_string()));
        }
        parse_click(payload)
            .map(|(x, y)| Message::Click { x, y })
            .ok_or_else(|| ProtocolError::ClickToken {
                token: payload.to_string(),
            })
    }

    /// Snapshot message for a state.
    pub fn snapshot(state: &GameState) -> Message {
        Message::Snapshot(codec::encode(state))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Get => f.write_str(GET),
            Message::Snapshot(body) => write!(f, "{}{}", SNAPSHOT_MARKER, body),
            Message::Click { x, y } => write!(f, "({}, {})", x, y),
        }
    }
}

/// Accepts `(x, y)`, with or without the parentheses and with any spacing
/// around the comma.
fn parse_click(token: &str) -> Option<(i32, i32)> {
    let inner = token.trim();
    let inner = inner.strip_prefix('(').unwrap_or(inner);
    let inner = inner.strip_suffix(')').unwrap_or(inner);
    let (x, y) = inner.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}
