//! Per-turn distribution: partition, fan out, join, merge.
//!
//! Turns are strictly sequential. A turn fans out one compute call per
//! partition of the current live-worker set, joins every response, and
//! only then swaps the merged grid in; a partial turn is never visible.
//! A failed call is recovered within the turn by redistributing just the
//! failed row range across the surviving workers, recursively, until
//! either some assignment succeeds or the workers are exhausted.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use torus_types::{Cell, Grid};

use crate::coordinator::Coordinator;
use crate::error::CoordinatorError;
use crate::partition::{extract_slab, partition_range, partition_rows, Partition};
use crate::pool::{WorkerPool, WorkerProxy};
use crate::state::SimEvent;

/// Interior rows of a computed range plus the cells that flipped.
type RangeResult = (Vec<Vec<u8>>, Vec<Cell>);

enum Step {
    Finished,
    Paused,
    Run { grid: Arc<Grid>, turn: u32 },
}

pub(crate) async fn run_simulation(coordinator: Coordinator) {
    let mut control_rx = coordinator.inner.control.subscribe();
    loop {
        let step = {
            let state = coordinator.inner.state.lock();
            if state.stop_requested || state.turn >= state.total_turns {
                Step::Finished
            } else if state.paused {
                Step::Paused
            } else {
                Step::Run {
                    grid: Arc::new(state.grid.clone()),
                    turn: state.turn,
                }
            }
        };
        match step {
            Step::Finished => break,
            Step::Paused => {
                // Suspend until the next control change. The flags are
                // re-checked from the top, so Stop and Shutdown are
                // observed without an intervening Resume.
                if control_rx.changed().await.is_err() {
                    break;
                }
            }
            Step::Run { grid, turn } => match run_turn(&coordinator, grid).await {
                Ok((new_grid, changed)) => {
                    let (next_turn, count) = {
                        let mut state = coordinator.inner.state.lock();
                        state.grid = new_grid;
                        state.turn = turn + 1;
                        state.changed = changed.clone();
                        (state.turn, state.grid.alive_count())
                    };
                    debug!(turn = next_turn, alive = count, flips = changed.len(), "turn merged");
                    let _ = coordinator.inner.events.send(SimEvent::TurnComplete {
                        turn: next_turn,
                        changed,
                    });
                    let _ = coordinator
                        .inner
                        .events
                        .send(SimEvent::AliveCount { turn: next_turn, count });
                }
                Err(err) => {
                    // Fatal to this run only; the last merged grid is
                    // retained for the control plane.
                    error!(%err, turn, "turn failed, halting simulation");
                    break;
                }
            },
        }
    }

    let turn = {
        let mut state = coordinator.inner.state.lock();
        state.processing = false;
        state.paused = false;
        state.turn
    };
    coordinator.inner.processing.send_replace(false);
    coordinator.inner.emit_state_change(turn);
    info!(turn, "simulation loop exited");
}

async fn run_turn(
    coordinator: &Coordinator,
    grid: Arc<Grid>,
) -> Result<(Grid, Vec<Cell>), CoordinatorError> {
    let live = coordinator.inner.pool.live_workers();
    if live.is_empty() {
        return Err(CoordinatorError::NoWorkersAvailable);
    }
    let ids: Vec<usize> = live.iter().map(|proxy| proxy.id()).collect();
    let partitions = partition_rows(&ids, grid.height())?;
    // Redistribution depth cannot usefully exceed the number of workers
    // alive at the start of the turn.
    let budget = live.len();
    let timeout = coordinator.inner.config.call_timeout;

    let mut join = JoinSet::new();
    for (slot, partition) in partitions.into_iter().enumerate() {
        let proxy = live[slot].clone();
        let pool = coordinator.inner.pool.clone();
        let grid = grid.clone();
        join.spawn(async move {
            compute_range(pool, grid, partition, proxy, timeout, budget)
                .await
                .map(|result| (partition, result))
        });
    }

    // Partitions are disjoint and exhaustive, so every row of the new
    // grid is overwritten before the merge completes.
    let mut new_grid = (*grid).clone();
    let mut all_changed = Vec::new();
    while let Some(joined) = join.join_next().await {
        let (partition, (rows, changed)) =
            joined.map_err(|err| CoordinatorError::TaskPanicked(err.to_string()))??;
        for (offset, row) in rows.iter().enumerate() {
            new_grid.set_row(partition.start_row + offset as u16, row);
        }
        all_changed.extend(changed);
    }
    Ok((new_grid, all_changed))
}

/// One attempt on the assigned worker, validated against the partition.
async fn attempt_compute(
    grid: &Grid,
    partition: Partition,
    proxy: &WorkerProxy,
    timeout: Duration,
) -> Result<RangeResult, CoordinatorError> {
    let slab = extract_slab(grid, partition.start_row, partition.end_row);
    let (rows, changed) = proxy
        .compute(slab, grid.width(), timeout)
        .await
        .map_err(|source| CoordinatorError::WorkerCallFailed {
            worker: proxy.id(),
            source,
        })?;
    if rows.len() != partition.rows() || rows.iter().any(|row| row.len() != grid.width() as usize) {
        return Err(CoordinatorError::InvalidDimensions {
            worker: proxy.id(),
            got_rows: rows.len(),
            expected_rows: partition.rows(),
        });
    }
    Ok((rows, changed))
}

/// Computes one row range on `proxy`, falling back to redistribution
/// across the surviving workers when the call fails. Boxed because
/// redistribution recurses.
fn compute_range(
    pool: Arc<WorkerPool>,
    grid: Arc<Grid>,
    partition: Partition,
    proxy: Arc<WorkerProxy>,
    timeout: Duration,
    budget: usize,
) -> Pin<Box<dyn Future<Output = Result<RangeResult, CoordinatorError>> + Send>> {
    Box::pin(async move {
        match attempt_compute(&grid, partition, &proxy, timeout).await {
            Ok(result) => {
                proxy.record_success();
                Ok(result)
            }
            Err(err) => {
                warn!(
                    worker = proxy.id(),
                    start = partition.start_row,
                    end = partition.end_row,
                    %err,
                    "compute call failed"
                );
                proxy.record_failure().await;
                if budget == 0 {
                    return Err(CoordinatorError::NoWorkersAvailable);
                }
                redistribute(pool, grid, partition, proxy.id(), timeout, budget - 1).await
            }
        }
    })
}

/// Re-partitions a failed range across the live workers minus the one
/// that just failed, and dispatches the sub-ranges concurrently. The
/// finer split lives only for this turn; the next turn re-partitions
/// from scratch.
async fn redistribute(
    pool: Arc<WorkerPool>,
    grid: Arc<Grid>,
    partition: Partition,
    failed_worker: usize,
    timeout: Duration,
    budget: usize,
) -> Result<RangeResult, CoordinatorError> {
    let survivors: Vec<Arc<WorkerProxy>> = pool
        .live_workers()
        .into_iter()
        .filter(|proxy| proxy.id() != failed_worker)
        .collect();
    if survivors.is_empty() {
        return Err(CoordinatorError::NoWorkersAvailable);
    }
    info!(
        start = partition.start_row,
        end = partition.end_row,
        survivors = survivors.len(),
        "redistributing failed partition"
    );

    let ids: Vec<usize> = survivors.iter().map(|proxy| proxy.id()).collect();
    let sub_partitions = partition_range(&ids, partition.start_row, partition.end_row)?;

    let mut join = JoinSet::new();
    for (slot, sub) in sub_partitions.into_iter().enumerate() {
        let proxy = survivors[slot].clone();
        let pool = pool.clone();
        let grid = grid.clone();
        join.spawn(async move {
            compute_range(pool, grid, sub, proxy, timeout, budget)
                .await
                .map(|result| (sub, result))
        });
    }

    let mut rows = vec![Vec::new(); partition.rows()];
    let mut changed = Vec::new();
    while let Some(joined) = join.join_next().await {
        let (sub, (sub_rows, sub_changed)) =
            joined.map_err(|err| CoordinatorError::TaskPanicked(err.to_string()))??;
        let base = (sub.start_row - partition.start_row) as usize;
        for (offset, row) in sub_rows.into_iter().enumerate() {
            rows[base + offset] = row;
        }
        changed.extend(sub_changed);
    }
    Ok((rows, changed))
}
