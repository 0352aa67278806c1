//! Screen geometry: pointer coordinates to grid cells and back.
//!
//! ```text
//!  y=100 ┌ReserveOne┐      ┌──────── Board ────────┐      ┌ReserveTwo┐
//!        x=77              x=407                          x=892
//! ```
//!
//! Cells are squares of `cell_size` separated by `gap`; all three grids
//! share the same top edge.

use serde::{Deserialize, Serialize};
use summoners_core::{Location, Region};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub screen_width: i32,
    pub screen_height: i32,
    pub cell_size: i32,
    pub gap: i32,
    pub top: i32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            screen_width: 1200,
            screen_height: 800,
            cell_size: 75,
            gap: 2,
            top: 100,
        }
    }
}

impl Layout {
    #[inline]
    fn pitch(&self) -> i32 {
        self.cell_size + self.gap
    }

    /// Left edge of a region.
    pub fn left(&self, region: Region) -> i32 {
        let pitch = self.pitch();
        match region {
            Region::ReserveOne => pitch,
            Region::Board => (self.screen_width - 5 * pitch) / 2,
            Region::ReserveTwo => self.screen_width - 4 * pitch,
        }
    }

    /// Inclusive horizontal extent of a region.
    fn x_span(&self, region: Region) -> (i32, i32) {
        let cols = region.cols() as i32;
        let left = self.left(region);
        (left, left + cols * self.cell_size + (cols - 1) * self.gap)
    }

    /// Top-left pixel of a cell.
    fn cell_origin(&self, loc: Location) -> (i32, i32) {
        let pitch = self.pitch();
        (
            self.left(loc.region) + i32::from(loc.col) * pitch,
            self.top + i32::from(loc.row) * pitch,
        )
    }

    /// Resolve a pointer position to the cell under it.
    ///
    /// Regions are checked in screen order and cells row-major; both edges
    /// of a cell count as inside it. Gaps and margins resolve to `None`.
    pub fn resolve(&self, x: i32, y: i32) -> Option<Location> {
        let region = Region::all().find(|&region| {
            let (left, right) = self.x_span(region);
            left <= x && x <= right
        })?;

        Location::all_in(region).find(|&loc| {
            let (cx, cy) = self.cell_origin(loc);
            cx <= x && x <= cx + self.cell_size && cy <= y && y <= cy + self.cell_size
        })
    }

    /// Pixel at the centre of a cell.
    pub fn cell_center(&self, loc: Location) -> (i32, i32) {
        let (x, y) = self.cell_origin(loc);
        (x + self.cell_size / 2, y + self.cell_size / 2)
    }
}
