//! Next-generation computation for grid slabs.
//!
//! This is the worker-side half of the simulation: a pure function from a
//! row slab (partition rows plus halo rows) to the next generation of its
//! interior rows. It has no I/O and no state, so a dispatch that fails and
//! is retried elsewhere produces identical results.

use torus_types::{Cell, Slab, ALIVE, DEAD};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("slab has {got} rows, expected {expected} ({interior} interior + 2 halo)")]
    BadRowCount {
        got: usize,
        expected: usize,
        interior: usize,
    },

    #[error("slab row {row} has {got} cells, expected width {expected}")]
    BadRowWidth {
        row: usize,
        got: usize,
        expected: usize,
    },

    #[error("slab row range {start}..{end} is empty")]
    EmptyRange { start: u16, end: u16 },
}

/// Counts live neighbours of `(x, row)` where `above` and `below` are the
/// adjacent rows. Columns wrap modulo `width`; rows do not wrap here
/// because halo rows already carry the correct toroidal neighbours.
fn live_neighbours(above: &[u8], row: &[u8], below: &[u8], x: usize, width: usize) -> u8 {
    let left = (x + width - 1) % width;
    let right = (x + 1) % width;
    let mut count = 0;
    for neighbour_row in [above, below] {
        for nx in [left, x, right] {
            if neighbour_row[nx] != DEAD {
                count += 1;
            }
        }
    }
    if row[left] != DEAD {
        count += 1;
    }
    if row[right] != DEAD {
        count += 1;
    }
    count
}

/// Computes the next generation of a slab's interior rows.
///
/// Returns the new interior rows (in partition order) and the cells whose
/// state flipped, in global coordinates.
pub fn next_slab_state(slab: &Slab, width: u16) -> Result<(Vec<Vec<u8>>, Vec<Cell>), StepError> {
    if slab.end_row <= slab.start_row {
        return Err(StepError::EmptyRange {
            start: slab.start_row,
            end: slab.end_row,
        });
    }
    let interior = slab.interior_height();
    let expected = interior + 2;
    if slab.rows.len() != expected {
        return Err(StepError::BadRowCount {
            got: slab.rows.len(),
            expected,
            interior,
        });
    }
    let width = width as usize;
    for (i, row) in slab.rows.iter().enumerate() {
        if row.len() != width {
            return Err(StepError::BadRowWidth {
                row: i,
                got: row.len(),
                expected: width,
            });
        }
    }

    let mut new_rows = Vec::with_capacity(interior);
    let mut changed = Vec::new();
    for i in 1..=interior {
        let above = &slab.rows[i - 1];
        let row = &slab.rows[i];
        let below = &slab.rows[i + 1];
        let global_y = slab.start_row + (i as u16 - 1);

        let mut new_row = vec![DEAD; width];
        for x in 0..width {
            let neighbours = live_neighbours(above, row, below, x, width);
            let alive = row[x] != DEAD;
            let next = matches!((alive, neighbours), (true, 2) | (true, 3) | (false, 3));
            new_row[x] = if next { ALIVE } else { DEAD };
            if alive != next {
                changed.push(Cell::new(x as u16, global_y));
            }
        }
        new_rows.push(new_row);
    }
    Ok((new_rows, changed))
}

/// Advances a whole grid one generation in a single slab.
///
/// Reference path used by tests and small local runs; the distributed
/// coordinator must agree with this cell for cell.
pub fn step_grid(grid: &torus_types::Grid) -> (torus_types::Grid, Vec<Cell>) {
    let height = grid.height();
    let mut rows = Vec::with_capacity(height as usize + 2);
    rows.push(grid.row(-1).to_vec());
    for y in 0..height {
        rows.push(grid.row(y as i64).to_vec());
    }
    rows.push(grid.row(height as i64).to_vec());
    let slab = Slab {
        start_row: 0,
        end_row: height,
        rows,
    };
    // The slab is built to the exact shape next_slab_state validates.
    let (new_rows, changed) = match next_slab_state(&slab, grid.width()) {
        Ok(out) => out,
        Err(_) => unreachable!("whole-grid slab is well formed"),
    };
    let mut next = grid.clone();
    for (y, row) in new_rows.iter().enumerate() {
        next.set_row(y as u16, row);
    }
    (next, changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use torus_types::Grid;

    fn grid_from(cells: &[&[u8]]) -> Grid {
        Grid::from_rows(cells.iter().map(|r| r.to_vec()).collect()).unwrap()
    }

    #[test]
    fn diagonal_neighbours_wrap_around_the_torus() {
        // A single live cell at (0,0) is a diagonal neighbour of (2,2)
        // once both axes wrap.
        let grid = grid_from(&[&[255, 0, 0], &[0, 0, 0], &[0, 0, 0]]);
        let above = grid.row(1);
        let row = grid.row(2);
        let below = grid.row(3);
        assert_eq!(live_neighbours(above, row, below, 2, 3), 1);
    }

    #[test]
    fn lone_cell_dies() {
        let grid = grid_from(&[&[0, 0, 0], &[0, 255, 0], &[0, 0, 0]]);
        let (next, changed) = step_grid(&grid);
        assert_eq!(next.alive_count(), 0);
        assert_eq!(changed, vec![Cell::new(1, 1)]);
    }

    #[test]
    fn block_is_a_still_life() {
        let grid = grid_from(&[
            &[0, 0, 0, 0],
            &[0, 255, 255, 0],
            &[0, 255, 255, 0],
            &[0, 0, 0, 0],
        ]);
        let (next, changed) = step_grid(&grid);
        assert_eq!(next, grid);
        assert!(changed.is_empty());
    }

    #[test]
    fn blinker_oscillates() {
        let vertical = grid_from(&[
            &[0, 0, 0, 0, 0],
            &[0, 0, 255, 0, 0],
            &[0, 0, 255, 0, 0],
            &[0, 0, 255, 0, 0],
            &[0, 0, 0, 0, 0],
        ]);
        let horizontal = grid_from(&[
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
            &[0, 255, 255, 255, 0],
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
        ]);
        let (next, changed) = step_grid(&vertical);
        assert_eq!(next, horizontal);
        // The flips are the two vertical tips dying and the two
        // horizontal tips being born.
        let mut changed = changed;
        changed.sort();
        assert_eq!(
            changed,
            vec![
                Cell::new(1, 2),
                Cell::new(2, 1),
                Cell::new(2, 3),
                Cell::new(3, 2),
            ]
        );
        let (back, _) = step_grid(&horizontal);
        assert_eq!(back, vertical);
    }

    #[test]
    fn changed_cells_use_global_coordinates() {
        // Partition rows 3..5 of a 6-row grid; a lone live cell in the
        // interior dies and must be reported at its global position.
        let width = 3u16;
        let mut rows = vec![vec![0u8; 3]; 4];
        rows[1][1] = 255;
        let slab = Slab {
            start_row: 3,
            end_row: 5,
            rows,
        };
        let (new_rows, changed) = next_slab_state(&slab, width).unwrap();
        assert_eq!(new_rows.len(), 2);
        assert_eq!(changed, vec![Cell::new(1, 3)]);
    }

    #[test]
    fn malformed_slabs_are_rejected() {
        let slab = Slab {
            start_row: 0,
            end_row: 2,
            rows: vec![vec![0; 3]; 3],
        };
        assert!(matches!(
            next_slab_state(&slab, 3),
            Err(StepError::BadRowCount { .. })
        ));

        let slab = Slab {
            start_row: 0,
            end_row: 1,
            rows: vec![vec![0; 3], vec![0; 2], vec![0; 3]],
        };
        assert!(matches!(
            next_slab_state(&slab, 3),
            Err(StepError::BadRowWidth { row: 1, .. })
        ));

        let slab = Slab {
            start_row: 2,
            end_row: 2,
            rows: vec![],
        };
        assert!(matches!(
            next_slab_state(&slab, 3),
            Err(StepError::EmptyRange { .. })
        ));
    }

    #[test]
    fn identical_input_gives_identical_output() {
        let mut rows = vec![vec![0u8; 4]; 5];
        rows[1][0] = 255;
        rows[2][1] = 255;
        rows[3][2] = 255;
        let slab = Slab {
            start_row: 0,
            end_row: 3,
            rows,
        };
        let first = next_slab_state(&slab, 4).unwrap();
        let second = next_slab_state(&slab, 4).unwrap();
        assert_eq!(first, second);
    }
}
