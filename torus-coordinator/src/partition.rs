//! Row-range partitioning of the grid across the live worker set.

use torus_types::{Grid, Slab};

use crate::error::CoordinatorError;

/// A contiguous half-open row range assigned to one worker for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub worker_id: usize,
    pub start_row: u16,
    pub end_row: u16,
}

impl Partition {
    pub fn rows(&self) -> usize {
        (self.end_row - self.start_row) as usize
    }
}

/// Splits `[0, height)` across `worker_ids` in order.
pub fn partition_rows(worker_ids: &[usize], height: u16) -> Result<Vec<Partition>, CoordinatorError> {
    partition_range(worker_ids, 0, height)
}

/// Splits `[start_row, end_row)` across `worker_ids` in order.
///
/// Remainder policy: with `n` workers and `r = rows % n`, the first `r`
/// partitions take one extra row. When there are more workers than rows,
/// only the first `rows` workers receive a partition. Re-running with
/// the same worker list always yields the same ranges.
pub fn partition_range(
    worker_ids: &[usize],
    start_row: u16,
    end_row: u16,
) -> Result<Vec<Partition>, CoordinatorError> {
    if worker_ids.is_empty() {
        return Err(CoordinatorError::NoWorkersAvailable);
    }
    debug_assert!(start_row < end_row);
    let rows = (end_row - start_row) as usize;
    let workers = worker_ids.len().min(rows);
    let base = rows / workers;
    let remainder = rows % workers;

    let mut partitions = Vec::with_capacity(workers);
    let mut next = start_row;
    for (slot, &worker_id) in worker_ids.iter().take(workers).enumerate() {
        let take = base + usize::from(slot < remainder);
        let end = next + take as u16;
        partitions.push(Partition {
            worker_id,
            start_row: next,
            end_row: end,
        });
        next = end;
    }
    Ok(partitions)
}

/// Copies a partition's rows plus one halo row on each side out of the
/// grid. Halo selection wraps toroidally, so the partition at the top of
/// the grid borrows the bottom row and vice versa.
pub fn extract_slab(grid: &Grid, start_row: u16, end_row: u16) -> Slab {
    let mut rows = Vec::with_capacity((end_row - start_row) as usize + 2);
    for y in (start_row as i64 - 1)..=(end_row as i64) {
        rows.push(grid.row(y).to_vec());
    }
    Slab {
        start_row,
        end_row,
        rows,
    }
}
