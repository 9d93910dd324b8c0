//! Monochrome 64x32 display surface.
//!
//! Cells are only ever changed by the clear and draw instructions. Every
//! such change raises an edge-triggered redraw flag that the host consumes
//! with [`Display::poll_and_clear_redraw`]; any number of changes between
//! two polls collapse into a single `true`.

use serde::{Serialize, Deserialize};
use std::fmt;
use thiserror::Error;

/// Display width in pixels.
pub const WIDTH: usize = 64;

/// Display height in pixels.
pub const HEIGHT: usize = 32;

/// A row-major copy of the display.
pub type Grid = [[bool; WIDTH]; HEIGHT];

/// The display surface.
#[derive(Clone, Serialize, Deserialize)]
pub struct Display {
    /// Row-major cells, `WIDTH * HEIGHT` long.
    cells: Vec<bool>,
    redraw: bool,
}

impl Display {
    /// A blank display. The redraw flag starts raised so the host paints
    /// the initial frame.
    pub fn new() -> Self {
        Self {
            cells: vec![false; WIDTH * HEIGHT],
            redraw: true,
        }
    }

    /// Turn every cell off and raise the redraw flag.
    pub fn clear(&mut self) {
        self.cells.fill(false);
        self.raise_redraw();
    }

    /// Read one cell, `None` if outside the grid.
    pub fn pixel(&self, x: usize, y: usize) -> Option<bool> {
        Self::index(x, y).map(|i| self.cells[i])
    }

    /// XOR one cell with 1. Returns whether the cell was set before.
    pub fn toggle(&mut self, x: usize, y: usize) -> Result<bool, DisplayError> {
        let i = Self::index(x, y).ok_or(DisplayError::OutOfBounds { x, y })?;
        let was_set = self.cells[i];
        self.cells[i] = !was_set;
        Ok(was_set)
    }

    pub fn raise_redraw(&mut self) {
        self.redraw = true;
    }

    /// Return the redraw flag and reset it.
    pub fn poll_and_clear_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    /// Snapshot of the whole grid.
    pub fn grid(&self) -> Grid {
        let mut grid = [[false; WIDTH]; HEIGHT];
        for (row, cells) in grid.iter_mut().zip(self.cells.chunks_exact(WIDTH)) {
            row.copy_from_slice(cells);
        }
        grid
    }

    /// Number of cells that are on.
    pub fn lit_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    fn index(x: usize, y: usize) -> Option<usize> {
        (x < WIDTH && y < HEIGHT).then(|| y * WIDTH + x)
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Display")
            .field("lit", &self.lit_count())
            .field("redraw", &self.redraw)
            .finish()
    }
}

/// Text rendering: one line per row, `█` for lit cells.
impl fmt::Display for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks_exact(WIDTH) {
            let line: String = row.iter().map(|&c| if c { '█' } else { ' ' }).collect();
            writeln!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

/// Errors raised by display access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DisplayError {
    #[error("pixel ({x}, {y}) is outside the 64x32 display")]
    OutOfBounds { x: usize, y: usize },
}
