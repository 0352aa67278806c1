//! WASM bindings for summoners-core
//!
//! Lets a browser front end drive the rules engine and exchange snapshots
//! with the same text the native peers use.

use wasm_bindgen::prelude::*;

use crate::{codec, GameState, Location, Phase, Region, Team};

/// WASM-friendly wrapper around GameState
#[wasm_bindgen]
pub struct WasmGame {
    inner: GameState,
}

fn region_from_u8(region: u8) -> Option<Region> {
    match region {
        0 => Some(Region::Board),
        1 => Some(Region::ReserveOne),
        2 => Some(Region::ReserveTwo),
        _ => None,
    }
}

fn team_to_u8(team: Team) -> u8 {
    match team {
        Team::PlayerOne => 1,
        Team::PlayerTwo => 2,
        Team::Neutral => 3,
    }
}

#[wasm_bindgen]
impl WasmGame {
    /// Starting position
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmGame {
        WasmGame { inner: GameState::new() }
    }

    /// Parse a snapshot (without the `#` marker)
    pub fn decode(text: &str) -> Result<WasmGame, JsValue> {
        codec::decode(text)
            .map(|inner| WasmGame { inner })
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }

    /// Snapshot text for this state
    pub fn encode(&self) -> String {
        codec::encode(&self.inner)
    }

    /// Click a cell. Region is 0 (board), 1 (reserve one) or 2 (reserve two);
    /// anything else counts as a click outside every grid.
    pub fn click(&mut self, region: u8, row: u8, col: u8) {
        let location = region_from_u8(region).map(|region| Location::new(region, row, col));
        self.inner.click(location);
    }

    /// Active team (1 or 2)
    #[wasm_bindgen(js_name = activeTeam)]
    pub fn active_team(&self) -> u8 {
        team_to_u8(self.inner.active_team())
    }

    #[wasm_bindgen(js_name = movesRemaining)]
    pub fn moves_remaining(&self) -> u8 {
        self.inner.moves_remaining()
    }

    /// Winner: 0 (none), 1 (P1), 2 (P2) or 3 (draw)
    pub fn winner(&self) -> u8 {
        self.inner.winner().map_or(0, team_to_u8)
    }

    /// Whether a piece is currently selected
    #[wasm_bindgen(js_name = hasSelection)]
    pub fn has_selection(&self) -> bool {
        self.inner.phase() == Phase::PieceSelected
    }

    /// Candidate squares as [row, col, row, col, ...]
    pub fn candidates(&self) -> Vec<u8> {
        self.inner
            .candidates()
            .iter()
            .flat_map(|pos| [pos.row, pos.col])
            .collect()
    }

    /// Full state (pieces, grids, selection, turn) as a JS object
    pub fn state(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.inner).map_err(JsValue::from)
    }
}

impl Default for WasmGame {
    fn default() -> Self {
        Self::new()
    }
}
