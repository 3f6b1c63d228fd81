//! Shared types for the torus simulation
//!
//! This crate provides the data model used across the torus ecosystem:
//! the toroidal grid, cell coordinates, and the row slabs exchanged
//! between the coordinator and its workers.

use serde::{Deserialize, Serialize};

/// Cell value for a live cell. Matches the PGM convention used by the
/// grid file format, so grids round-trip through images without mapping.
pub const ALIVE: u8 = 255;

/// Cell value for a dead cell.
pub const DEAD: u8 = 0;

/// A cell coordinate in global grid space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: u16,
    pub y: u16,
}

impl Cell {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("grid must have at least one row and one column")]
    Empty,

    #[error("row {row} has {got} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        got: usize,
        expected: usize,
    },

    #[error("grid of {height} x {width} exceeds u16 dimensions")]
    TooLarge { height: usize, width: usize },

    #[error("grid holds {got} cells, dimensions require {expected}")]
    CellCountMismatch { got: usize, expected: usize },
}

/// A toroidal grid of two-state cells, stored row-major.
///
/// Indices wrap modulo the grid dimensions, so the last row is adjacent
/// to the first and likewise for columns. Dimensions are fixed for the
/// lifetime of the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: u16,
    height: u16,
    cells: Vec<u8>,
}

impl Default for Grid {
    /// A 1x1 dead grid, the placeholder before any simulation starts.
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            cells: vec![DEAD],
        }
    }
}

impl Grid {
    /// Creates an all-dead grid.
    pub fn new(width: u16, height: u16) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::Empty);
        }
        Ok(Self {
            width,
            height,
            cells: vec![DEAD; width as usize * height as usize],
        })
    }

    /// Builds a grid from row vectors. Every row must have the same
    /// length; non-zero bytes are normalized to [`ALIVE`].
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self, GridError> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(GridError::Empty);
        }
        if height > u16::MAX as usize || width > u16::MAX as usize {
            return Err(GridError::TooLarge { height, width });
        }
        let mut cells = Vec::with_capacity(height * width);
        for (y, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(GridError::RaggedRow {
                    row: y,
                    got: row.len(),
                    expected: width,
                });
            }
            cells.extend(row.iter().map(|&v| if v == DEAD { DEAD } else { ALIVE }));
        }
        Ok(Self {
            width: width as u16,
            height: height as u16,
            cells,
        })
    }

    /// Re-checks the internal invariants. Grids built locally always
    /// hold them; grids deserialized off the wire may not.
    pub fn validate(&self) -> Result<(), GridError> {
        if self.width == 0 || self.height == 0 {
            return Err(GridError::Empty);
        }
        let expected = self.width as usize * self.height as usize;
        if self.cells.len() != expected {
            return Err(GridError::CellCountMismatch {
                got: self.cells.len(),
                expected,
            });
        }
        Ok(())
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Reads a cell, wrapping both coordinates toroidally.
    pub fn get(&self, x: i64, y: i64) -> u8 {
        let x = x.rem_euclid(self.width as i64) as usize;
        let y = y.rem_euclid(self.height as i64) as usize;
        self.cells[y * self.width as usize + x]
    }

    pub fn set(&mut self, x: u16, y: u16, value: u8) {
        debug_assert!(x < self.width && y < self.height);
        self.cells[y as usize * self.width as usize + x as usize] = value;
    }

    /// Borrows row `y`, wrapping toroidally.
    pub fn row(&self, y: i64) -> &[u8] {
        let y = y.rem_euclid(self.height as i64) as usize;
        let w = self.width as usize;
        &self.cells[y * w..(y + 1) * w]
    }

    /// Replaces row `y` (unwrapped, must be in range).
    pub fn set_row(&mut self, y: u16, row: &[u8]) {
        debug_assert!(y < self.height);
        debug_assert_eq!(row.len(), self.width as usize);
        let w = self.width as usize;
        let start = y as usize * w;
        self.cells[start..start + w].copy_from_slice(row);
    }

    pub fn alive_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c != DEAD).count()
    }

    /// All live cells in row-major order.
    pub fn alive_cells(&self) -> Vec<Cell> {
        let w = self.width as usize;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &c)| c != DEAD)
            .map(|(i, _)| Cell::new((i % w) as u16, (i / w) as u16))
            .collect()
    }
}

/// A contiguous band of grid rows sent to a worker for one turn.
///
/// `rows` holds the partition's rows `[start_row, end_row)` plus one halo
/// row on each side: `rows[0]` is the row above `start_row` and the last
/// entry is the row at `end_row`, both selected with toroidal wraparound.
/// The worker only produces output for the interior rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slab {
    pub start_row: u16,
    pub end_row: u16,
    pub rows: Vec<Vec<u8>>,
}

impl Slab {
    /// Number of non-halo rows.
    pub fn interior_height(&self) -> usize {
        (self.end_row - self.start_row) as usize
    }
}
