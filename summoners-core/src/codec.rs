//! Snapshot codec: the full game state as one line of text.
//!
//! # Format
//!
//! ```text
//! <board>#<reserve one>#<reserve two>#<selected>#<candidates>#<active>#<moves>#<winner>
//!
//! board       five rows, each `c,c,c,c,c,;`   (cells end in `,`, rows end in `;`)
//! reserve     `c,c,c,`
//! cell        N | <kind><team>                 e.g. GP2
//! selected    N | <kind><team><region><row><col>   e.g. SP1BO12
//! candidates  zero or more `<row><col>,`       e.g. 22,13,
//! active      P1 | P2
//! moves       1 | 2 | 3
//! winner      P0 (none) | P1 | P2 | PN (draw)
//!
//! kind    C Centaur  D Dragon  G Goblin  S Slime  K Summoner
//! team    P1 PlayerOne  P2 PlayerTwo
//! region  BO Board  C1 ReserveOne  C2 ReserveTwo
//! ```
//!
//! The starting position encodes as
//!
//! ```text
//! CP1,KP1,DP1,KP1,CP1,;GP1,N,SP1,N,GP1,;N,N,N,N,N,;GP2,N,SP2,N,GP2,;CP2,KP2,DP2,KP2,CP2,;#N,N,N,#N,N,N,#N##P1#3#P0
//! ```
//!
//! Decoding is all-or-nothing: any malformed field rejects the whole
//! snapshot.

use derive_more::{Display, Error};

use crate::{
    GameState, Location, Piece, PieceKind, Pos, Region, Team, BOARD_SIZE, MOVES_PER_TURN,
    RESERVE_SLOTS,
};

/// Number of `#`-separated fields in a snapshot.
pub const FIELD_COUNT: usize = 8;

const FIELD_SEP: char = '#';
const ROW_END: char = ';';
const CELL_END: char = ',';
const EMPTY: &str = "N";
const NO_WINNER: &str = "P0";

/// Reasons a snapshot can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum DecodeError {
    #[display("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[display("{field}: expected {expected} terminated entries in {text:?}")]
    Shape {
        field: &'static str,
        expected: usize,
        text: String,
    },
    #[display("invalid cell code {code:?}")]
    Cell { code: String },
    #[display("invalid selected code {code:?}")]
    Selected { code: String },
    #[display("selected code {code:?} does not match the piece on that cell")]
    SelectedMismatch { code: String },
    #[display("invalid candidate {code:?}")]
    Candidate { code: String },
    #[display("invalid active team {code:?}")]
    ActiveTeam { code: String },
    #[display("invalid moves remaining {code:?}")]
    MovesRemaining { code: String },
    #[display("invalid winner {code:?}")]
    Winner { code: String },
}

// ============================================================================
// CODES
// ============================================================================

impl PieceKind {
    /// Single-letter wire code.
    pub fn letter(self) -> char {
        match self {
            PieceKind::Centaur => 'C',
            PieceKind::Dragon => 'D',
            PieceKind::Goblin => 'G',
            PieceKind::Slime => 'S',
            PieceKind::Summoner => 'K',
        }
    }

    pub fn from_letter(letter: char) -> Option<PieceKind> {
        PieceKind::all().find(|kind| kind.letter() == letter)
    }
}

impl Team {
    /// Two-letter wire code. `Neutral` is only meaningful as a winner.
    pub fn code(self) -> &'static str {
        match self {
            Team::PlayerOne => "P1",
            Team::PlayerTwo => "P2",
            Team::Neutral => "PN",
        }
    }

    fn from_player_code(code: &str) -> Option<Team> {
        match code {
            "P1" => Some(Team::PlayerOne),
            "P2" => Some(Team::PlayerTwo),
            _ => None,
        }
    }
}

impl Region {
    /// Two-letter wire code.
    pub fn code(self) -> &'static str {
        match self {
            Region::Board => "BO",
            Region::ReserveOne => "C1",
            Region::ReserveTwo => "C2",
        }
    }

    fn from_code(code: &str) -> Option<Region> {
        Region::all().find(|region| region.code() == code)
    }
}

/// Three-letter cell code for a piece, e.g. `DP2`.
pub fn piece_code(piece: &Piece) -> String {
    format!("{}{}", piece.kind.letter(), piece.team.code())
}

// ============================================================================
// ENCODE
// ============================================================================

/// Serialize a state. Total: every state the engine can reach encodes.
pub fn encode(state: &GameState) -> String {
    let mut out = String::with_capacity(128);

    for row in 0..BOARD_SIZE as u8 {
        for col in 0..BOARD_SIZE as u8 {
            push_cell(&mut out, state.piece_at(Location::board(row, col)));
        }
        out.push(ROW_END);
    }

    for region in [Region::ReserveOne, Region::ReserveTwo] {
        out.push(FIELD_SEP);
        for loc in Location::all_in(region) {
            push_cell(&mut out, state.piece_at(loc));
        }
    }

    out.push(FIELD_SEP);
    match state.selected() {
        Some(piece) => {
            out.push_str(&piece_code(piece));
            out.push_str(piece.region.code());
            out.push_str(&format!("{}{}", piece.row, piece.col));
        }
        None => out.push_str(EMPTY),
    }

    out.push(FIELD_SEP);
    for pos in state.candidates() {
        out.push_str(&format!("{}{}", pos.row, pos.col));
        out.push(CELL_END);
    }

    out.push(FIELD_SEP);
    out.push_str(state.active_team().code());
    out.push(FIELD_SEP);
    out.push_str(&state.moves_remaining().to_string());
    out.push(FIELD_SEP);
    out.push_str(state.winner().map_or(NO_WINNER, Team::code));

    out
}

fn push_cell(out: &mut String, piece: Option<&Piece>) {
    match piece {
        Some(piece) => out.push_str(&piece_code(piece)),
        None => out.push_str(EMPTY),
    }
    out.push(CELL_END);
}

// ============================================================================
// DECODE
// ============================================================================

/// Parse a snapshot into a fresh state.
pub fn decode(text: &str) -> Result<GameState, DecodeError> {
    let fields: Vec<&str> = text.split(FIELD_SEP).collect();
    if fields.len() != FIELD_COUNT {
        return Err(DecodeError::FieldCount {
            expected: FIELD_COUNT,
            found: fields.len(),
        });
    }

    let mut state = GameState::empty();

    let rows = split_terminated(fields[0], ROW_END, BOARD_SIZE, "board")?;
    for (row, row_text) in rows.into_iter().enumerate() {
        let cells = split_terminated(row_text, CELL_END, BOARD_SIZE, "board row")?;
        for (col, code) in cells.into_iter().enumerate() {
            fill_cell(&mut state, code, Location::board(row as u8, col as u8))?;
        }
    }

    for (field, region) in [(fields[1], Region::ReserveOne), (fields[2], Region::ReserveTwo)] {
        let cells = split_terminated(field, CELL_END, RESERVE_SLOTS, "reserve")?;
        for (col, code) in cells.into_iter().enumerate() {
            fill_cell(&mut state, code, Location::reserve(region, col as u8))?;
        }
    }

    let selected = match fields[3] {
        EMPTY => None,
        code => Some(parse_selected(&state, code)?),
    };
    let candidates = parse_candidates(fields[4])?;
    state.set_selection(selected, candidates);

    let active = Team::from_player_code(fields[5]).ok_or_else(|| DecodeError::ActiveTeam {
        code: fields[5].to_string(),
    })?;
    let moves = match fields[6] {
        "1" => 1,
        "2" => 2,
        "3" => MOVES_PER_TURN,
        code => {
            return Err(DecodeError::MovesRemaining {
                code: code.to_string(),
            })
        }
    };
    let winner = match fields[7] {
        NO_WINNER => None,
        "PN" => Some(Team::Neutral),
        code => Some(Team::from_player_code(code).ok_or_else(|| DecodeError::Winner {
            code: code.to_string(),
        })?),
    };
    state.set_turn(active, moves, winner);

    Ok(state)
}

/// Split `text` into exactly `count` entries, each followed by `end`.
fn split_terminated<'a>(
    text: &'a str,
    end: char,
    count: usize,
    field: &'static str,
) -> Result<Vec<&'a str>, DecodeError> {
    let shape_error = || DecodeError::Shape {
        field,
        expected: count,
        text: text.to_string(),
    };
    let body = text.strip_suffix(end).ok_or_else(shape_error)?;
    let entries: Vec<&str> = body.split(end).collect();
    if entries.len() != count {
        return Err(shape_error());
    }
    Ok(entries)
}

fn parse_piece(code: &str) -> Option<(PieceKind, Team)> {
    if code.len() != 3 || !code.is_ascii() {
        return None;
    }
    let kind = PieceKind::from_letter(code.chars().next()?)?;
    let team = Team::from_player_code(&code[1..])?;
    Some((kind, team))
}

fn fill_cell(state: &mut GameState, code: &str, loc: Location) -> Result<(), DecodeError> {
    if code == EMPTY {
        return Ok(());
    }
    let (kind, team) = parse_piece(code).ok_or_else(|| DecodeError::Cell {
        code: code.to_string(),
    })?;
    state.insert(kind, team, loc).ok_or_else(|| DecodeError::Cell {
        code: code.to_string(),
    })?;
    Ok(())
}

fn digit(c: u8) -> Option<u8> {
    c.is_ascii_digit().then(|| c - b'0')
}

fn parse_selected(state: &GameState, code: &str) -> Result<crate::PieceId, DecodeError> {
    let invalid = || DecodeError::Selected {
        code: code.to_string(),
    };
    if code.len() != 7 || !code.is_ascii() {
        return Err(invalid());
    }
    let bytes = code.as_bytes();
    let (kind, team) = parse_piece(&code[..3]).ok_or_else(invalid)?;
    let region = Region::from_code(&code[3..5]).ok_or_else(invalid)?;
    let row = digit(bytes[5]).ok_or_else(invalid)?;
    let col = digit(bytes[6]).ok_or_else(invalid)?;
    if !region.contains(row, col) {
        return Err(invalid());
    }

    let loc = Location::new(region, row, col);
    match state.occupant(loc) {
        Some(id) if state.piece(id).is_some_and(|p| p.kind == kind && p.team == team) => Ok(id),
        _ => Err(DecodeError::SelectedMismatch {
            code: code.to_string(),
        }),
    }
}

fn parse_candidates(text: &str) -> Result<Vec<Pos>, DecodeError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let body = text.strip_suffix(CELL_END).ok_or_else(|| DecodeError::Candidate {
        code: text.to_string(),
    })?;
    body.split(CELL_END)
        .map(|entry| {
            let bytes = entry.as_bytes();
            let pos = match bytes {
                [r, c] => digit(*r).zip(digit(*c)),
                _ => None,
            };
            match pos {
                Some((row, col)) if Region::Board.contains(row, col) => Ok(Pos::new(row, col)),
                _ => Err(DecodeError::Candidate {
                    code: entry.to_string(),
                }),
            }
        })
        .collect()
}
