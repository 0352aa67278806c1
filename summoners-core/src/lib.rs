//! Summoners game logic: piece catalog, board/reserve model and rules engine.
//!
//! # Layout
//!
//! ```text
//!           col 0    1    2    3    4
//!   row 0     C    K    D    K    C      PlayerOne back rank
//!   row 1     G    .    S    .    G
//!   row 2     .    .    .    .    .
//!   row 3     G    .    S    .    G
//!   row 4     C    K    D    K    C      PlayerTwo back rank
//!
//!   ReserveOne: [ . . . ]   PlayerOne's captures (1x3)
//!   ReserveTwo: [ . . . ]   PlayerTwo's captures (1x3)
//! ```
//!
//! # Turn Structure
//!
//! The active team makes three moves, then play passes to the other team.
//! Each move is a selection click followed by a destination click. A
//! captured piece changes sides and waits in the capturing team's reserve
//! until it is redeployed onto a square no Summoner threatens.
//!
//! A team loses once none of its Summoners on the board has a legal move.
//!
//! # Storage
//!
//! Pieces live in an arena addressed by [`PieceId`]. The grids only hold
//! ids, and every mutation goes through private `place`/`vacate` helpers
//! that keep a piece's recorded location equal to the cell holding it.
//!
//! See [`codec`] for the snapshot text exchanged between peers.

pub mod codec;
pub mod protocol;

#[cfg(feature = "wasm")]
pub mod wasm;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub use codec::{decode, encode, DecodeError};
pub use protocol::{Message, ProtocolError};

/// Board width and height.
pub const BOARD_SIZE: usize = 5;
/// Slots in each reserve.
pub const RESERVE_SLOTS: usize = 3;
/// Moves each team makes before the turn passes.
pub const MOVES_PER_TURN: u8 = 3;

/// Team identifier. `Neutral` only ever appears as a winner (draw).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum Team {
    PlayerOne,
    PlayerTwo,
    Neutral,
}

impl Team {
    /// Get the opposing team.
    #[inline]
    pub fn opponent(self) -> Team {
        match self {
            Team::PlayerOne => Team::PlayerTwo,
            Team::PlayerTwo => Team::PlayerOne,
            Team::Neutral => Team::Neutral,
        }
    }

    /// Reserve that receives this team's captures.
    #[inline]
    pub fn reserve(self) -> Option<Region> {
        match self {
            Team::PlayerOne => Some(Region::ReserveOne),
            Team::PlayerTwo => Some(Region::ReserveTwo),
            Team::Neutral => None,
        }
    }
}

/// One of the three grids a piece can occupy.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum Region {
    Board,
    ReserveOne,
    ReserveTwo,
}

impl Region {
    /// Number of rows in this grid.
    #[inline]
    pub fn rows(self) -> usize {
        match self {
            Region::Board => BOARD_SIZE,
            Region::ReserveOne | Region::ReserveTwo => 1,
        }
    }

    /// Number of columns in this grid.
    #[inline]
    pub fn cols(self) -> usize {
        match self {
            Region::Board => BOARD_SIZE,
            Region::ReserveOne | Region::ReserveTwo => RESERVE_SLOTS,
        }
    }

    /// Check if (row, col) lies inside this grid.
    #[inline]
    pub fn contains(self, row: u8, col: u8) -> bool {
        usize::from(row) < self.rows() && usize::from(col) < self.cols()
    }

    fn reserve_index(self) -> Option<usize> {
        match self {
            Region::Board => None,
            Region::ReserveOne => Some(0),
            Region::ReserveTwo => Some(1),
        }
    }

    /// All regions, in the order they are laid out on screen.
    pub fn all() -> impl Iterator<Item = Region> {
        [Region::ReserveOne, Region::Board, Region::ReserveTwo].into_iter()
    }
}

/// Piece kind.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    Goblin,
    Dragon,
    Slime,
    Summoner,
    Centaur,
}

// ============================================================================
// PIECE CATALOG
// ============================================================================

/// Goblin and Summoner: one orthogonal step.
const ORTHOGONAL_STEPS: [(i8, i8); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

/// Dragon: orthogonal double steps, then diagonal single steps.
const DRAGON_OFFSETS: [(i8, i8); 8] = [
    (0, -2),
    (0, 2),
    (-2, 0),
    (2, 0),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

/// Centaur: orthogonal double steps only.
const CENTAUR_OFFSETS: [(i8, i8); 4] = [(0, -2), (0, 2), (-2, 0), (2, 0)];

/// Slimes only move toward the opposing back rank.
const SLIME_PLAYER_ONE: [(i8, i8); 1] = [(1, 0)];
const SLIME_PLAYER_TWO: [(i8, i8); 1] = [(-1, 0)];

impl PieceKind {
    /// Ordered (row, col) move offsets for a piece of this kind owned by `team`.
    pub fn offsets(self, team: Team) -> &'static [(i8, i8)] {
        match self {
            PieceKind::Goblin | PieceKind::Summoner => &ORTHOGONAL_STEPS,
            PieceKind::Dragon => &DRAGON_OFFSETS,
            PieceKind::Centaur => &CENTAUR_OFFSETS,
            PieceKind::Slime => match team {
                Team::PlayerOne => &SLIME_PLAYER_ONE,
                Team::PlayerTwo => &SLIME_PLAYER_TWO,
                Team::Neutral => &[],
            },
        }
    }

    /// All kinds.
    pub fn all() -> impl Iterator<Item = PieceKind> {
        [
            PieceKind::Goblin,
            PieceKind::Dragon,
            PieceKind::Slime,
            PieceKind::Summoner,
            PieceKind::Centaur,
        ]
        .into_iter()
    }
}

// ============================================================================
// COORDINATES
// ============================================================================

/// A square on the 5x5 board.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub row: u8,
    pub col: u8,
}

impl Pos {
    #[inline]
    pub fn new(row: u8, col: u8) -> Pos {
        debug_assert!(Region::Board.contains(row, col));
        Pos { row, col }
    }

    /// Square reached by adding (dr, dc), if it is on the board.
    #[inline]
    pub fn offset(self, dr: i8, dc: i8) -> Option<Pos> {
        let row = self.row as i8 + dr;
        let col = self.col as i8 + dc;
        if (0..BOARD_SIZE as i8).contains(&row) && (0..BOARD_SIZE as i8).contains(&col) {
            Some(Pos { row: row as u8, col: col as u8 })
        } else {
            None
        }
    }

    /// Iterate over all 25 squares, row-major.
    pub fn all() -> impl Iterator<Item = Pos> {
        (0..BOARD_SIZE as u8)
            .flat_map(|row| (0..BOARD_SIZE as u8).map(move |col| Pos { row, col }))
    }
}

/// Address of a cell in any region.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct Location {
    pub region: Region,
    pub row: u8,
    pub col: u8,
}

impl Location {
    #[inline]
    pub fn new(region: Region, row: u8, col: u8) -> Location {
        Location { region, row, col }
    }

    /// A board square.
    #[inline]
    pub fn board(row: u8, col: u8) -> Location {
        Location::new(Region::Board, row, col)
    }

    /// A reserve slot (reserves are a single row).
    #[inline]
    pub fn reserve(region: Region, col: u8) -> Location {
        Location::new(region, 0, col)
    }

    /// Check if this location names a cell that exists.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.region.contains(self.row, self.col)
    }

    /// Iterate over every cell of a region, row-major.
    pub fn all_in(region: Region) -> impl Iterator<Item = Location> {
        (0..region.rows() as u8).flat_map(move |row| {
            (0..region.cols() as u8).map(move |col| Location::new(region, row, col))
        })
    }
}

impl From<Pos> for Location {
    fn from(pos: Pos) -> Location {
        Location::board(pos.row, pos.col)
    }
}

// ============================================================================
// PIECES
// ============================================================================

/// Index of a piece in the [`GameState`] arena.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct PieceId(pub(crate) usize);

/// A piece and the cell it currently occupies.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub team: Team,
    pub region: Region,
    pub row: u8,
    pub col: u8,
}

impl Piece {
    #[inline]
    pub fn location(&self) -> Location {
        Location::new(self.region, self.row, self.col)
    }

    /// Current movement offsets (depends on team for Slimes).
    #[inline]
    pub fn offsets(&self) -> &'static [(i8, i8)] {
        self.kind.offsets(self.team)
    }

    /// On-board squares this piece's raw offsets point at, ignoring occupancy.
    pub fn targets(&self) -> impl Iterator<Item = Pos> + '_ {
        let origin = Pos { row: self.row, col: self.col };
        self.offsets()
            .iter()
            .filter_map(move |&(dr, dc)| origin.offset(dr, dc))
    }
}

/// Interaction phase derived from the state.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Phase {
    Selecting,
    PieceSelected,
    GameOver,
}

// ============================================================================
// GAME STATE
// ============================================================================

/// Full game state shared between peers.
///
/// Mutated in place by the rules engine, or replaced wholesale by a decoded
/// snapshot. Equality compares what is observable (piece placement,
/// selection and turn metadata), not arena order.
#[derive(Clone, Debug, Serialize)]
pub struct GameState {
    pieces: Vec<Piece>,
    board: [[Option<PieceId>; BOARD_SIZE]; BOARD_SIZE],
    reserves: [[Option<PieceId>; RESERVE_SLOTS]; 2],
    selected: Option<PieceId>,
    candidates: Vec<Pos>,
    active_team: Team,
    moves_remaining: u8,
    winner: Option<Team>,
}

const BACK_RANK: [PieceKind; BOARD_SIZE] = [
    PieceKind::Centaur,
    PieceKind::Summoner,
    PieceKind::Dragon,
    PieceKind::Summoner,
    PieceKind::Centaur,
];

const SECOND_RANK: [Option<PieceKind>; BOARD_SIZE] = [
    Some(PieceKind::Goblin),
    None,
    Some(PieceKind::Slime),
    None,
    Some(PieceKind::Goblin),
];

impl GameState {
    /// Starting position with PlayerOne to move.
    pub fn new() -> GameState {
        let mut state = GameState::empty();
        for (col, kind) in BACK_RANK.iter().enumerate() {
            state.insert(*kind, Team::PlayerOne, Location::board(0, col as u8));
            state.insert(*kind, Team::PlayerTwo, Location::board(4, col as u8));
        }
        for (col, kind) in SECOND_RANK.iter().enumerate() {
            if let Some(kind) = kind {
                state.insert(*kind, Team::PlayerOne, Location::board(1, col as u8));
                state.insert(*kind, Team::PlayerTwo, Location::board(3, col as u8));
            }
        }
        state
    }

    /// Empty board and reserves, PlayerOne to move with a full turn.
    pub fn empty() -> GameState {
        GameState {
            pieces: Vec::with_capacity(16),
            board: [[None; BOARD_SIZE]; BOARD_SIZE],
            reserves: [[None; RESERVE_SLOTS]; 2],
            selected: None,
            candidates: Vec::new(),
            active_team: Team::PlayerOne,
            moves_remaining: MOVES_PER_TURN,
            winner: None,
        }
    }

    /// Put a new piece on an empty cell.
    ///
    /// Returns `None` (and changes nothing) if the cell does not exist, is
    /// occupied, or `team` is `Neutral`.
    pub fn insert(&mut self, kind: PieceKind, team: Team, loc: Location) -> Option<PieceId> {
        if team == Team::Neutral || self.cell(loc)?.is_some() {
            return None;
        }
        let id = PieceId(self.pieces.len());
        self.pieces.push(Piece {
            kind,
            team,
            region: loc.region,
            row: loc.row,
            col: loc.col,
        });
        self.place(id, loc);
        Some(id)
    }

    // ========== Accessors ==========

    /// Piece behind `id`, or `None` for an id this state never issued.
    #[inline]
    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(id.0)
    }

    /// Ids only come from this arena's own grids.
    #[inline]
    fn arena(&self, id: PieceId) -> &Piece {
        &self.pieces[id.0]
    }

    /// Piece occupying `loc`, if any.
    pub fn piece_at(&self, loc: Location) -> Option<&Piece> {
        self.cell(loc).flatten().map(|id| self.arena(id))
    }

    /// All pieces, in arena order.
    pub fn pieces(&self) -> impl Iterator<Item = &Piece> {
        self.pieces.iter()
    }

    pub fn selected(&self) -> Option<&Piece> {
        self.selected.map(|id| self.arena(id))
    }

    pub fn selected_id(&self) -> Option<PieceId> {
        self.selected
    }

    pub fn candidates(&self) -> &[Pos] {
        &self.candidates
    }

    pub fn active_team(&self) -> Team {
        self.active_team
    }

    pub fn moves_remaining(&self) -> u8 {
        self.moves_remaining
    }

    pub fn winner(&self) -> Option<Team> {
        self.winner
    }

    pub fn phase(&self) -> Phase {
        if self.winner.is_some() {
            Phase::GameOver
        } else if self.selected.is_some() {
            Phase::PieceSelected
        } else {
            Phase::Selecting
        }
    }

    /// Number of occupied slots in a reserve (0 for the board).
    pub fn reserve_count(&self, region: Region) -> usize {
        region
            .reserve_index()
            .map(|idx| self.reserves[idx].iter().flatten().count())
            .unwrap_or(0)
    }

    /// Check that every grid cell and the arena agree on piece placement.
    ///
    /// Each piece must be referenced by exactly one cell, and that cell's
    /// coordinates must equal the piece's recorded location.
    pub fn is_consistent(&self) -> bool {
        let mut seen = vec![false; self.pieces.len()];
        for region in Region::all() {
            for loc in Location::all_in(region) {
                if let Some(id) = self.cell(loc).flatten() {
                    match seen.get_mut(id.0) {
                        Some(flag) if !*flag => *flag = true,
                        _ => return false,
                    }
                    if self.arena(id).location() != loc {
                        return false;
                    }
                }
            }
        }
        seen.iter().all(|&s| s) && self.selected.map_or(true, |id| id.0 < self.pieces.len())
    }

    // ========== Cell Operations ==========

    /// Contents of a cell, or `None` if the location does not exist.
    fn cell(&self, loc: Location) -> Option<Option<PieceId>> {
        let (row, col) = (usize::from(loc.row), usize::from(loc.col));
        match loc.region {
            Region::Board => self.board.get(row)?.get(col).copied(),
            Region::ReserveOne | Region::ReserveTwo => {
                if row != 0 {
                    return None;
                }
                let idx = loc.region.reserve_index()?;
                self.reserves[idx].get(col).copied()
            }
        }
    }

    fn cell_mut(&mut self, loc: Location) -> Option<&mut Option<PieceId>> {
        let (row, col) = (usize::from(loc.row), usize::from(loc.col));
        match loc.region {
            Region::Board => self.board.get_mut(row)?.get_mut(col),
            Region::ReserveOne | Region::ReserveTwo => {
                if row != 0 {
                    return None;
                }
                let idx = loc.region.reserve_index()?;
                self.reserves[idx].get_mut(col)
            }
        }
    }

    #[inline]
    fn board_piece(&self, pos: Pos) -> Option<&Piece> {
        self.board[pos.row as usize][pos.col as usize].map(|id| self.arena(id))
    }

    /// Point `loc` at `id` and record the location on the piece.
    /// Does NOT clear the piece's previous cell.
    fn place(&mut self, id: PieceId, loc: Location) {
        if let Some(cell) = self.cell_mut(loc) {
            *cell = Some(id);
            let piece = &mut self.pieces[id.0];
            piece.region = loc.region;
            piece.row = loc.row;
            piece.col = loc.col;
        }
    }

    fn vacate(&mut self, loc: Location) -> Option<PieceId> {
        self.cell_mut(loc).and_then(Option::take)
    }

    /// Move a piece from its current cell to `to`.
    fn relocate(&mut self, id: PieceId, to: Location) {
        let from = self.arena(id).location();
        self.vacate(from);
        self.place(id, to);
    }

    fn free_reserve_slot(&self, team: Team) -> Option<Location> {
        let region = team.reserve()?;
        let idx = region.reserve_index()?;
        self.reserves[idx]
            .iter()
            .position(Option::is_none)
            .map(|col| Location::reserve(region, col as u8))
    }

    // ========== Legality ==========

    /// Summoners currently on the board, row-major.
    ///
    /// Always a fresh scan; nothing about Summoners is cached.
    pub fn summoners_on_board(&self) -> impl Iterator<Item = &Piece> {
        Pos::all()
            .filter_map(move |pos| self.board_piece(pos))
            .filter(|piece| piece.kind == PieceKind::Summoner)
    }

    /// Can `mover` displace `target`?
    fn can_capture(&self, mover: &Piece, target: &Piece) -> bool {
        if target.team == mover.team
            || target.kind == PieceKind::Summoner
            || mover.kind == PieceKind::Summoner
        {
            return false;
        }
        self.free_reserve_slot(mover.team).is_some()
    }

    /// Double step whose middle square is occupied.
    fn jump_blocked(&self, from: Pos, to: Pos) -> bool {
        let dr = to.row as i8 - from.row as i8;
        let dc = to.col as i8 - from.col as i8;
        let double_step = (dr.abs() == 2 && dc == 0) || (dc.abs() == 2 && dr == 0);
        if !double_step {
            return false;
        }
        match from.offset(dr / 2, dc / 2) {
            Some(mid) => self.board_piece(mid).is_some(),
            None => false,
        }
    }

    /// Legal destinations for a piece standing on the board.
    pub fn board_destinations(&self, piece: &Piece) -> Vec<Pos> {
        let from = Pos { row: piece.row, col: piece.col };
        let mut moves = Vec::with_capacity(piece.offsets().len());

        for to in piece.targets() {
            if let Some(target) = self.board_piece(to) {
                if !self.can_capture(piece, target) {
                    continue;
                }
            }
            if self.jump_blocked(from, to) || moves.contains(&to) {
                continue;
            }
            moves.push(to);
        }

        moves
    }

    /// Every on-board square any Summoner's raw offsets point at.
    pub fn summoner_threats(&self) -> Vec<Pos> {
        let mut threats = Vec::new();
        for summoner in self.summoners_on_board() {
            for pos in summoner.targets() {
                if !threats.contains(&pos) {
                    threats.push(pos);
                }
            }
        }
        threats
    }

    /// Empty squares a reserve piece may be redeployed to.
    pub fn redeploy_squares(&self) -> Vec<Pos> {
        let threats = self.summoner_threats();
        Pos::all()
            .filter(|&pos| self.board_piece(pos).is_none() && !threats.contains(&pos))
            .collect()
    }

    fn destinations(&self, id: PieceId) -> Vec<Pos> {
        let piece = self.arena(id);
        match piece.region {
            Region::Board => self.board_destinations(piece),
            Region::ReserveOne | Region::ReserveTwo => self.redeploy_squares(),
        }
    }

    /// Aggregate legal moves of a team's on-board Summoners.
    pub fn legal_summoner_moves(&self, team: Team) -> Vec<Pos> {
        self.summoners_on_board()
            .filter(|summoner| summoner.team == team)
            .flat_map(|summoner| self.board_destinations(summoner))
            .collect()
    }

    /// Winner implied by the current position, if any.
    pub fn detect_winner(&self) -> Option<Team> {
        let one_stuck = self.legal_summoner_moves(Team::PlayerOne).is_empty();
        let two_stuck = self.legal_summoner_moves(Team::PlayerTwo).is_empty();
        match (one_stuck, two_stuck) {
            (true, true) => Some(Team::Neutral),
            (true, false) => Some(Team::PlayerTwo),
            (false, true) => Some(Team::PlayerOne),
            (false, false) => None,
        }
    }

    // ========== Rules Engine ==========

    /// Route a resolved click: select when nothing is selected, otherwise
    /// treat it as a destination. `None` (a click outside every grid) is
    /// ignored.
    pub fn click(&mut self, location: Option<Location>) {
        let Some(loc) = location else {
            return;
        };
        if self.selected.is_none() {
            self.select_at(loc);
        } else {
            self.move_to(loc);
        }
    }

    /// Select the active team's piece at `loc` and compute its candidates.
    ///
    /// No-op if a piece is already selected, the game is over, or the cell
    /// is empty, off-grid, or holds an enemy piece.
    #[instrument(level = "debug", skip(self), fields(team = ?self.active_team))]
    pub fn select_at(&mut self, loc: Location) {
        if self.winner.is_some() || self.selected.is_some() {
            return;
        }
        let Some(id) = self.cell(loc).flatten() else {
            return;
        };
        if self.arena(id).team != self.active_team {
            return;
        }
        self.selected = Some(id);
        self.candidates = self.destinations(id);
        debug!(kind = ?self.arena(id).kind, candidates = self.candidates.len(), "piece selected");
    }

    /// Move the selected piece to `loc`, or deselect if that is not a
    /// candidate.
    #[instrument(level = "debug", skip(self), fields(team = ?self.active_team))]
    pub fn move_to(&mut self, loc: Location) {
        if self.winner.is_some() {
            return;
        }
        let target =
            (loc.region == Region::Board && loc.is_valid()).then(|| Pos::new(loc.row, loc.col));
        match (self.selected, target) {
            (Some(id), Some(to)) if self.candidates.contains(&to) => {
                if !self.apply_move(id, to) {
                    self.clear_selection();
                }
            }
            _ => {
                debug!("not a candidate, deselecting");
                self.clear_selection();
            }
        }
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.candidates.clear();
    }

    /// Apply a candidate move. Returns false, without mutating, if the move
    /// would capture something it may not.
    fn apply_move(&mut self, id: PieceId, to: Pos) -> bool {
        let dest = Location::from(to);
        let mover = *self.arena(id);

        let capture = match self.board_piece(to).copied() {
            Some(target) if !self.can_capture(&mover, &target) => return false,
            Some(_) => match (self.occupant(dest), self.free_reserve_slot(mover.team)) {
                (Some(victim), Some(slot)) => Some((victim, slot)),
                _ => return false,
            },
            None => None,
        };

        if let Some((victim, slot)) = capture {
            self.vacate(dest);
            // Captured pieces switch sides; a Slime's direction follows its team.
            self.pieces[victim.0].team = mover.team;
            self.place(victim, slot);
            debug!(kind = ?self.arena(victim).kind, ?slot, "captured");
        }
        self.relocate(id, dest);
        debug!(kind = ?mover.kind, from = ?mover.location(), to = ?dest, "moved");

        self.clear_selection();
        self.moves_remaining = self.moves_remaining.saturating_sub(1);
        if self.moves_remaining == 0 {
            self.active_team = self.active_team.opponent();
            self.moves_remaining = MOVES_PER_TURN;
            debug!(team = ?self.active_team, "turn passes");
        }

        if let Some(winner) = self.detect_winner() {
            debug!(?winner, "game over");
            self.winner = Some(winner);
        }
        true
    }

    // ========== Snapshot Assembly (codec) ==========

    pub(crate) fn set_selection(&mut self, selected: Option<PieceId>, candidates: Vec<Pos>) {
        self.selected = selected;
        self.candidates = candidates;
    }

    pub(crate) fn set_turn(
        &mut self,
        active_team: Team,
        moves_remaining: u8,
        winner: Option<Team>,
    ) {
        self.active_team = active_team;
        self.moves_remaining = moves_remaining;
        self.winner = winner;
    }

    pub(crate) fn occupant(&self, loc: Location) -> Option<PieceId> {
        self.cell(loc).flatten()
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for GameState {
    fn eq(&self, other: &Self) -> bool {
        let same_cells = Region::all().all(|region| {
            Location::all_in(region).all(|loc| {
                let a = self.piece_at(loc).map(|p| (p.kind, p.team));
                let b = other.piece_at(loc).map(|p| (p.kind, p.team));
                a == b
            })
        });
        same_cells
            && self.selected().map(Piece::location) == other.selected().map(Piece::location)
            && self.candidates == other.candidates
            && self.active_team == other.active_team
            && self.moves_remaining == other.moves_remaining
            && self.winner == other.winner
    }
}

impl Eq for GameState {}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = |loc: Location| match self.piece_at(loc) {
            Some(piece) => codec::piece_code(piece),
            None => " . ".to_string(),
        };

        let reserve = |region: Region| -> String {
            Location::all_in(region).map(cell).collect::<Vec<_>>().join(" ")
        };

        writeln!(f, "ReserveOne  {}", reserve(Region::ReserveOne))?;
        writeln!(f, "      0   1   2   3   4")?;
        for row in 0..BOARD_SIZE as u8 {
            let cells: Vec<String> = (0..BOARD_SIZE as u8)
                .map(|col| cell(Location::board(row, col)))
                .collect();
            writeln!(f, "  {}  {}", row, cells.join(" "))?;
        }
        writeln!(f, "ReserveTwo  {}", reserve(Region::ReserveTwo))?;

        match self.winner {
            Some(Team::Neutral) => writeln!(f, "Draw")?,
            Some(team) => writeln!(f, "Winner: {:?}", team)?,
            None => writeln!(f, "{:?} to move, {} left", self.active_team, self.moves_remaining)?,
        }
        if let Some(piece) = self.selected() {
            let targets: Vec<String> = self
                .candidates
                .iter()
                .map(|p| format!("{}{}", p.row, p.col))
                .collect();
            write!(
                f,
                "Selected {} at {:?}({},{}) -> [{}]",
                codec::piece_code(piece),
                piece.region,
                piece.row,
                piece.col,
                targets.join(" ")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(pairs: &[(u8, u8)]) -> Vec<Pos> {
        pairs.iter().map(|&(r, c)| Pos::new(r, c)).collect()
    }

    /// Bare position with one Summoner per team tucked in opposite corners.
    fn corners() -> GameState {
        let mut state = GameState::empty();
        state.insert(PieceKind::Summoner, Team::PlayerOne, Location::board(0, 0));
        state.insert(PieceKind::Summoner, Team::PlayerTwo, Location::board(4, 4));
        state
    }

    #[test]
    fn test_team_opponent() {
        assert_eq!(Team::PlayerOne.opponent(), Team::PlayerTwo);
        assert_eq!(Team::PlayerTwo.opponent(), Team::PlayerOne);
        assert_eq!(Team::Neutral.opponent(), Team::Neutral);
    }

    #[test]
    fn test_team_reserve() {
        assert_eq!(Team::PlayerOne.reserve(), Some(Region::ReserveOne));
        assert_eq!(Team::PlayerTwo.reserve(), Some(Region::ReserveTwo));
        assert_eq!(Team::Neutral.reserve(), None);
    }

    #[test]
    fn test_region_dimensions() {
        assert!(Region::Board.contains(4, 4));
        assert!(!Region::Board.contains(5, 0));
        assert!(Region::ReserveOne.contains(0, 2));
        assert!(!Region::ReserveOne.contains(1, 0));
        assert!(!Region::ReserveTwo.contains(0, 3));
    }

    #[test]
    fn test_catalog_sizes() {
        assert_eq!(PieceKind::Goblin.offsets(Team::PlayerOne).len(), 4);
        assert_eq!(PieceKind::Summoner.offsets(Team::PlayerTwo).len(), 4);
        assert_eq!(PieceKind::Dragon.offsets(Team::PlayerOne).len(), 8);
        assert_eq!(PieceKind::Centaur.offsets(Team::PlayerOne).len(), 4);
        assert_eq!(PieceKind::Slime.offsets(Team::PlayerOne), &[(1, 0)]);
        assert_eq!(PieceKind::Slime.offsets(Team::PlayerTwo), &[(-1, 0)]);
    }

    #[test]
    fn test_catalog_centaur_only_double_steps() {
        for &(dr, dc) in PieceKind::Centaur.offsets(Team::PlayerOne) {
            assert_eq!(dr.abs() + dc.abs(), 2);
            assert!(dr == 0 || dc == 0);
        }
    }

    #[test]
    fn test_pos_offset_bounds() {
        assert_eq!(Pos::new(0, 0).offset(-1, 0), None);
        assert_eq!(Pos::new(4, 4).offset(0, 1), None);
        assert_eq!(Pos::new(2, 2).offset(2, -2), Some(Pos::new(4, 0)));
        assert_eq!(Pos::all().count(), 25);
    }

    #[test]
    fn test_initial_layout() {
        let state = GameState::new();
        assert_eq!(state.pieces().count(), 16);
        assert!(state.is_consistent());
        assert_eq!(state.active_team(), Team::PlayerOne);
        assert_eq!(state.moves_remaining(), 3);
        assert_eq!(state.winner(), None);

        let back = state.piece_at(Location::board(0, 1)).unwrap();
        assert_eq!((back.kind, back.team), (PieceKind::Summoner, Team::PlayerOne));
        let slime = state.piece_at(Location::board(3, 2)).unwrap();
        assert_eq!((slime.kind, slime.team), (PieceKind::Slime, Team::PlayerTwo));
        assert!(state.piece_at(Location::board(2, 2)).is_none());
        assert!(state.piece_at(Location::board(1, 1)).is_none());
    }

    #[test]
    fn test_piece_lookup_with_foreign_id() {
        let mut other = GameState::new();
        let id = other
            .insert(PieceKind::Goblin, Team::PlayerOne, Location::board(2, 2))
            .unwrap();
        assert_eq!(other.piece(id).map(|p| p.location()), Some(Location::board(2, 2)));
        assert!(GameState::new().piece(id).is_none());
    }

    #[test]
    fn test_insert_rejects_occupied_and_invalid() {
        let mut state = GameState::new();
        assert_eq!(state.insert(PieceKind::Goblin, Team::PlayerOne, Location::board(0, 0)), None);
        assert_eq!(state.insert(PieceKind::Goblin, Team::PlayerOne, Location::board(5, 0)), None);
        let off_grid = Location::new(Region::ReserveOne, 1, 0);
        assert_eq!(state.insert(PieceKind::Goblin, Team::PlayerOne, off_grid), None);
        assert_eq!(state.insert(PieceKind::Goblin, Team::Neutral, Location::board(2, 2)), None);
        assert_eq!(state.pieces().count(), 16);
    }

    #[test]
    fn test_select_slime_forward_only() {
        let mut state = GameState::new();
        state.select_at(Location::board(1, 2));
        assert_eq!(state.phase(), Phase::PieceSelected);
        assert_eq!(state.candidates(), &positions(&[(2, 2)])[..]);
    }

    #[test]
    fn test_select_enemy_is_noop() {
        let mut state = GameState::new();
        state.select_at(Location::board(3, 0));
        assert_eq!(state.selected(), None);
        assert!(state.candidates().is_empty());
    }

    #[test]
    fn test_select_empty_and_offgrid_is_noop() {
        let mut state = GameState::new();
        state.select_at(Location::board(2, 2));
        state.select_at(Location::board(9, 9));
        state.select_at(Location::new(Region::ReserveOne, 0, 7));
        assert_eq!(state.phase(), Phase::Selecting);
    }

    #[test]
    fn test_select_while_selected_is_noop() {
        let mut state = GameState::new();
        state.select_at(Location::board(1, 2));
        state.select_at(Location::board(1, 0));
        assert_eq!(state.selected().unwrap().kind, PieceKind::Slime);
    }

    #[test]
    fn test_dragon_initial_candidates() {
        let mut state = GameState::new();
        state.select_at(Location::board(0, 2));
        // (2,2) would jump the Slime, (0,0)/(0,4) are friendly.
        assert_eq!(state.candidates(), &positions(&[(1, 1), (1, 3)])[..]);
    }

    #[test]
    fn test_centaur_blocked_by_jump_rule() {
        let mut state = GameState::new();
        state.select_at(Location::board(0, 0));
        assert_eq!(state.phase(), Phase::PieceSelected);
        assert!(state.candidates().is_empty());
    }

    #[test]
    fn test_centaur_double_step_when_clear() {
        let mut state = corners();
        state.insert(PieceKind::Centaur, Team::PlayerOne, Location::board(2, 2));
        state.select_at(Location::board(2, 2));
        assert_eq!(state.candidates(), &positions(&[(2, 0), (2, 4), (0, 2), (4, 2)])[..]);
    }

    #[test]
    fn test_summoner_never_captures() {
        let mut state = corners();
        state.insert(PieceKind::Goblin, Team::PlayerTwo, Location::board(0, 1));
        state.select_at(Location::board(0, 0));
        assert_eq!(state.candidates(), &positions(&[(1, 0)])[..]);
    }

    #[test]
    fn test_enemy_summoner_not_capturable() {
        let mut state = corners();
        state.insert(PieceKind::Goblin, Team::PlayerOne, Location::board(4, 3));
        state.select_at(Location::board(4, 3));
        assert!(!state.candidates().contains(&Pos::new(4, 4)));
        assert!(state.candidates().contains(&Pos::new(4, 2)));
    }

    #[test]
    fn test_full_reserve_blocks_capture() {
        let mut state = corners();
        for col in 0..3 {
            let slot = Location::reserve(Region::ReserveOne, col);
            state.insert(PieceKind::Goblin, Team::PlayerOne, slot);
        }
        state.insert(PieceKind::Goblin, Team::PlayerOne, Location::board(2, 2));
        state.insert(PieceKind::Goblin, Team::PlayerTwo, Location::board(3, 2));
        state.select_at(Location::board(2, 2));
        assert!(!state.candidates().contains(&Pos::new(3, 2)));
        assert_eq!(state.candidates().len(), 3);
    }

    #[test]
    fn test_move_to_empty() {
        let mut state = GameState::new();
        state.select_at(Location::board(1, 0));
        state.move_to(Location::board(2, 0));
        assert!(state.piece_at(Location::board(1, 0)).is_none());
        assert_eq!(state.piece_at(Location::board(2, 0)).unwrap().kind, PieceKind::Goblin);
        assert_eq!(state.moves_remaining(), 2);
        assert_eq!(state.phase(), Phase::Selecting);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_invalid_destination_deselects() {
        let mut state = GameState::new();
        state.select_at(Location::board(1, 2));
        state.move_to(Location::board(3, 3));
        assert_eq!(state.phase(), Phase::Selecting);
        assert_eq!(state.moves_remaining(), 3);
        assert!(state.piece_at(Location::board(1, 2)).is_some());
    }

    #[test]
    fn test_move_to_reserve_region_deselects() {
        let mut state = GameState::new();
        state.select_at(Location::board(1, 2));
        state.move_to(Location::reserve(Region::ReserveOne, 0));
        assert_eq!(state.phase(), Phase::Selecting);
        assert_eq!(state.moves_remaining(), 3);
    }

    #[test]
    fn test_move_without_selection_is_harmless() {
        let mut state = GameState::new();
        state.move_to(Location::board(2, 2));
        assert_eq!(state, GameState::new());
    }

    #[test]
    fn test_turn_passes_after_three_moves() {
        let mut state = GameState::new();
        let moves = [((1, 0), (2, 0)), ((1, 4), (2, 4)), ((1, 2), (2, 2))];
        for (i, ((fr, fc), (tr, tc))) in moves.into_iter().enumerate() {
            assert_eq!(state.active_team(), Team::PlayerOne);
            assert_eq!(state.moves_remaining(), 3 - i as u8);
            state.click(Some(Location::board(fr, fc)));
            state.click(Some(Location::board(tr, tc)));
        }
        assert_eq!(state.active_team(), Team::PlayerTwo);
        assert_eq!(state.moves_remaining(), 3);
    }

    #[test]
    fn test_capture_goes_to_reserve() {
        let mut state = corners();
        state.insert(PieceKind::Goblin, Team::PlayerOne, Location::board(2, 2));
        state.insert(PieceKind::Slime, Team::PlayerTwo, Location::board(3, 2));

        state.select_at(Location::board(2, 2));
        assert!(state.candidates().contains(&Pos::new(3, 2)));
        state.move_to(Location::board(3, 2));

        let captured = state.piece_at(Location::reserve(Region::ReserveOne, 0)).unwrap();
        assert_eq!(captured.kind, PieceKind::Slime);
        assert_eq!(captured.team, Team::PlayerOne);
        assert_eq!(captured.offsets(), &[(1, 0)]);
        assert_eq!(state.piece_at(Location::board(3, 2)).unwrap().team, Team::PlayerOne);
        assert_eq!(state.reserve_count(Region::ReserveOne), 1);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_redeploy_avoids_summoner_threats() {
        let mut state = GameState::new();
        state.insert(PieceKind::Goblin, Team::PlayerOne, Location::reserve(Region::ReserveOne, 1));
        state.select_at(Location::reserve(Region::ReserveOne, 1));
        assert_eq!(
            state.candidates(),
            &positions(&[(2, 0), (2, 1), (2, 2), (2, 3), (2, 4)])[..]
        );

        state.move_to(Location::board(2, 3));
        assert!(state.piece_at(Location::reserve(Region::ReserveOne, 1)).is_none());
        assert_eq!(state.piece_at(Location::board(2, 3)).unwrap().region, Region::Board);
        assert_eq!(state.reserve_count(Region::ReserveOne), 0);
        assert!(state.is_consistent());
    }

    #[test]
    fn test_summoner_threats_ignore_occupancy() {
        let state = GameState::new();
        let threats = state.summoner_threats();
        // Friendly-occupied back rank squares still count as threatened.
        assert!(threats.contains(&Pos::new(0, 2)));
        assert!(threats.contains(&Pos::new(3, 3)));
        assert!(!threats.contains(&Pos::new(2, 2)));
    }

    #[test]
    fn test_reserve_summoner_is_ignored_by_win_check() {
        let mut state = corners();
        let slot = Location::reserve(Region::ReserveTwo, 0);
        state.insert(PieceKind::Summoner, Team::PlayerTwo, slot);
        assert_eq!(state.summoners_on_board().count(), 2);
        assert_eq!(state.detect_winner(), None);
    }

    #[test]
    fn test_winner_when_summoners_stuck() {
        let mut state = corners();
        state.insert(PieceKind::Goblin, Team::PlayerTwo, Location::board(4, 3));
        state.insert(PieceKind::Goblin, Team::PlayerOne, Location::board(2, 4));

        state.select_at(Location::board(2, 4));
        state.move_to(Location::board(3, 4));

        assert_eq!(state.winner(), Some(Team::PlayerOne));
        assert_eq!(state.phase(), Phase::GameOver);
    }

    #[test]
    fn test_draw_when_both_stuck() {
        let mut state = corners();
        state.insert(PieceKind::Goblin, Team::PlayerOne, Location::board(0, 1));
        state.insert(PieceKind::Goblin, Team::PlayerOne, Location::board(2, 0));
        state.insert(PieceKind::Goblin, Team::PlayerTwo, Location::board(4, 3));
        state.insert(PieceKind::Goblin, Team::PlayerTwo, Location::board(3, 4));

        state.click(Some(Location::board(2, 0)));
        state.click(Some(Location::board(1, 0)));

        assert_eq!(state.winner(), Some(Team::Neutral));
    }

    #[test]
    fn test_game_over_freezes_engine() {
        let mut state = corners();
        state.insert(PieceKind::Goblin, Team::PlayerTwo, Location::board(4, 3));
        state.insert(PieceKind::Goblin, Team::PlayerOne, Location::board(2, 4));
        state.insert(PieceKind::Goblin, Team::PlayerOne, Location::board(2, 0));
        state.click(Some(Location::board(2, 4)));
        state.click(Some(Location::board(3, 4)));
        assert_eq!(state.winner(), Some(Team::PlayerOne));

        let frozen = state.clone();
        state.click(Some(Location::board(2, 0)));
        state.click(Some(Location::board(2, 1)));
        assert_eq!(state, frozen);
        assert_eq!(state.selected(), None);
    }

    #[test]
    fn test_no_team_without_summoners_loses_at_once() {
        let mut state = GameState::empty();
        state.insert(PieceKind::Summoner, Team::PlayerOne, Location::board(0, 0));
        state.insert(PieceKind::Goblin, Team::PlayerOne, Location::board(2, 2));
        state.click(Some(Location::board(2, 2)));
        state.click(Some(Location::board(2, 3)));
        assert_eq!(state.winner(), Some(Team::PlayerOne));
    }

    #[test]
    fn test_click_none_is_noop() {
        let mut state = GameState::new();
        state.click(Some(Location::board(1, 2)));
        state.click(None);
        assert_eq!(state.phase(), Phase::PieceSelected);
    }

    #[test]
    fn test_equality_ignores_arena_order() {
        let mut a = GameState::empty();
        a.insert(PieceKind::Goblin, Team::PlayerOne, Location::board(0, 0));
        a.insert(PieceKind::Dragon, Team::PlayerTwo, Location::board(4, 4));
        let mut b = GameState::empty();
        b.insert(PieceKind::Dragon, Team::PlayerTwo, Location::board(4, 4));
        b.insert(PieceKind::Goblin, Team::PlayerOne, Location::board(0, 0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_display_mentions_turn() {
        let text = GameState::new().to_string();
        assert!(text.contains("PlayerOne to move, 3 left"));
        assert!(text.contains("CP1 KP1 DP1 KP1 CP1"));
    }

    #[test]
    fn test_random_play_invariants() {
        use rand::prelude::*;

        let mut rng = rand::rng();

        for _ in 0..100 {
            let mut state = GameState::new();

            for _ in 0..120 {
                if state.winner().is_some() {
                    break;
                }
                let team = state.active_team();
                let owned: Vec<Location> = Region::all()
                    .flat_map(Location::all_in)
                    .filter(|&loc| state.piece_at(loc).map_or(false, |p| p.team == team))
                    .collect();
                let from = owned[rng.random_range(0..owned.len())];
                state.select_at(from);

                let before = (state.active_team(), state.moves_remaining());
                if state.candidates().is_empty() {
                    state.move_to(from);
                    assert_eq!((state.active_team(), state.moves_remaining()), before);
                    continue;
                }
                let to = state.candidates()[rng.random_range(0..state.candidates().len())];
                state.move_to(Location::from(to));

                if before.1 == 1 {
                    assert_eq!(state.active_team(), before.0.opponent());
                    assert_eq!(state.moves_remaining(), 3);
                } else {
                    assert_eq!(state.active_team(), before.0);
                    assert_eq!(state.moves_remaining(), before.1 - 1);
                }
                assert!(state.is_consistent());
                assert!(state.reserve_count(Region::ReserveOne) <= RESERVE_SLOTS);
                assert!(state.reserve_count(Region::ReserveTwo) <= RESERVE_SLOTS);
                assert_eq!(state.summoners_on_board().count(), 4);
            }
        }
    }
}
