//! Per-peer protocol state machine.
//!
//! A session owns the local copy of the game. Every method is synchronous
//! and returns the wire messages the caller should send; the tick loop in
//! [`crate::runner`] does the I/O.
//!
//! Authority moves with the turn: whichever peer's team is active resolves
//! clicks and broadcasts the resulting snapshot. The other peer only ever
//! replaces its state wholesale from those snapshots.

use derive_more::{Display, Error, From};
use summoners_core::{codec, DecodeError, GameState, Message, Team};
use tracing::{debug, info, warn};
use xxhash_rust::xxh64::xxh64;

use crate::layout::Layout;
use crate::transport::TransportError;

#[derive(Debug, Display, Error, From)]
pub enum SessionError {
    #[display("peer snapshot rejected, session desynchronized: {_0}")]
    Desync(DecodeError),
    #[display("transport failure: {_0}")]
    Transport(TransportError),
}

pub struct PeerSession {
    local_team: Team,
    layout: Layout,
    game: GameState,
    /// Bumped whenever `game` changes.
    revision: u64,
}

/// Hex xxh64 digest of a snapshot, for comparing the two peers' logs.
pub fn snapshot_digest(body: &str) -> String {
    format!("{:016x}", xxh64(body.as_bytes(), 0))
}

impl PeerSession {
    pub fn new(local_team: Team, layout: Layout) -> Self {
        Self {
            local_team,
            layout,
            game: GameState::new(),
            revision: 0,
        }
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn local_team(&self) -> Team {
        self.local_team
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The local team is the one to move.
    pub fn is_authoritative(&self) -> bool {
        self.game.active_team() == self.local_team
    }

    fn accepts_clicks(&self) -> bool {
        self.is_authoritative() && self.game.winner().is_none()
    }

    /// Messages to send once connected. PlayerTwo asks for the current state.
    pub fn start(&self) -> Vec<String> {
        match self.local_team {
            Team::PlayerTwo => vec![Message::Get.to_string()],
            _ => Vec::new(),
        }
    }

    /// Local pointer event. Ignored while the other team is moving.
    pub fn pointer(&mut self, x: i32, y: i32) -> Vec<String> {
        if !self.accepts_clicks() {
            debug!(x, y, "Withholding input, not our turn");
            return Vec::new();
        }
        self.apply_click(x, y)
    }

    /// Process one tick's worth of inbound messages.
    ///
    /// Only the newest message counts; anything older in the same batch is
    /// superseded. A snapshot that fails to decode is fatal.
    pub fn handle_inbound(&mut self, batch: Vec<String>) -> Result<Vec<String>, SessionError> {
        let superseded = batch.len().saturating_sub(1);
        let Some(latest) = batch.into_iter().last() else {
            return Ok(Vec::new());
        };
        if superseded > 0 {
            debug!(superseded, "Dropping older inbound messages");
        }

        match Message::parse(&latest) {
            Ok(Message::Get) if self.is_authoritative() => Ok(vec![self.publish()]),
            Ok(Message::Get) => {
                debug!("Ignoring get, not authoritative");
                Ok(Vec::new())
            }
            Ok(Message::Snapshot(body)) => {
                let next = codec::decode(&body)?;
                if next != self.game {
                    self.game = next;
                    self.revision += 1;
                }
                debug!(digest = %snapshot_digest(&body), "Applied peer snapshot");
                Ok(Vec::new())
            }
            Ok(Message::Click { x, y }) if self.accepts_clicks() => Ok(self.apply_click(x, y)),
            Ok(Message::Click { x, y }) => {
                debug!(x, y, "Ignoring remote click, not authoritative");
                Ok(Vec::new())
            }
            Err(err) => {
                warn!(%err, "Dropping unrecognized message");
                Ok(Vec::new())
            }
        }
    }

    /// Resolve and apply a click, returning a snapshot if anything changed.
    fn apply_click(&mut self, x: i32, y: i32) -> Vec<String> {
        let before = codec::encode(&self.game);
        let location = self.layout.resolve(x, y);
        self.game.click(location);
        if codec::encode(&self.game) == before {
            return Vec::new();
        }
        self.revision += 1;
        vec![self.publish()]
    }

    /// Snapshot message for the current state.
    fn publish(&self) -> String {
        let message = Message::snapshot(&self.game);
        if let Message::Snapshot(body) = &message {
            info!(
                digest = %snapshot_digest(body),
                team = ?self.game.active_team(),
                moves = self.game.moves_remaining(),
                "Broadcasting snapshot"
            );
        }
        message.to_string()
    }
}
