//! The coordinator's control-state machine.
//!
//! One `Coordinator` handle (cheap to clone, shared state behind an
//! `Arc`) owns the simulation for the life of the process. Control
//! operations serialize against the running turn loop through a single
//! mutex plus a watch channel that the loop waits on while paused;
//! watch channels remember versions, so a control change can never be
//! lost between a flag check and the wait.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::info;

use torus_proto::WorldSnapshot;
use torus_types::{Cell, Grid};

use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::pool::WorkerPool;
use crate::state::{SimEvent, SimState};
use crate::turn;

pub(crate) struct Shared {
    pub(crate) config: CoordinatorConfig,
    pub(crate) pool: Arc<WorkerPool>,
    pub(crate) state: Mutex<SimState>,
    /// Bumped on every control mutation; the turn loop waits on it
    /// while paused.
    pub(crate) control: watch::Sender<()>,
    /// Tracks whether a turn loop is running, so a superseding
    /// `Process` can await the old loop's exit without polling.
    pub(crate) processing: watch::Sender<bool>,
    pub(crate) shutdown: watch::Sender<bool>,
    pub(crate) events: broadcast::Sender<SimEvent>,
    /// Serializes concurrent `Process` calls so at most one turn loop
    /// is ever spawned.
    process_lock: tokio::sync::Mutex<()>,
}

impl Shared {
    pub(crate) fn emit_state_change(&self, turn: u32) {
        let state = self.state.lock().control_state();
        let _ = self.events.send(SimEvent::StateChange { turn, state });
    }
}

#[derive(Clone)]
pub struct Coordinator {
    pub(crate) inner: Arc<Shared>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig, pool: Arc<WorkerPool>) -> Self {
        let (control, _) = watch::channel(());
        let (processing, _) = watch::channel(false);
        let (shutdown, _) = watch::channel(false);
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Shared {
                config,
                pool,
                state: Mutex::new(SimState::default()),
                control,
                processing,
                shutdown,
                events,
                process_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SimEvent> {
        self.inner.events.subscribe()
    }

    /// Becomes true once `shutdown` has torn the coordinator down.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// Starts a simulation run and returns immediately. A run already
    /// in progress is stopped first and its loop awaited, so two loops
    /// never exist at once.
    pub async fn process(&self, grid: Grid, turns: u32) -> Result<(), CoordinatorError> {
        grid.validate()?;
        let _guard = self.inner.process_lock.lock().await;

        let superseding = {
            let mut state = self.inner.state.lock();
            if state.shutting_down {
                return Err(CoordinatorError::ShuttingDown);
            }
            if state.processing {
                state.stop_requested = true;
                true
            } else {
                false
            }
        };
        if superseding {
            info!("superseding a running simulation");
            self.inner.control.send_replace(());
            self.wait_until_idle().await;
        }

        {
            let mut state = self.inner.state.lock();
            state.grid = grid;
            state.turn = 0;
            state.total_turns = turns;
            state.processing = true;
            state.paused = false;
            state.stop_requested = false;
            state.changed.clear();
        }
        self.inner.processing.send_replace(true);
        self.inner.emit_state_change(0);
        info!(turns, "starting simulation");

        let coordinator = self.clone();
        tokio::spawn(async move { turn::run_simulation(coordinator).await });
        Ok(())
    }

    /// Blocks until no turn loop is running.
    pub async fn wait_until_idle(&self) {
        let mut rx = self.inner.processing.subscribe();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Requests a pause and returns the last fully completed turn. A
    /// no-op unless a run is active and unpaused.
    pub fn pause(&self) -> u32 {
        let (turn, transitioned) = {
            let mut state = self.inner.state.lock();
            let transitioned = state.processing && !state.paused;
            if transitioned {
                state.paused = true;
            }
            (state.turn, transitioned)
        };
        if transitioned {
            info!(turn, "pausing simulation");
            self.inner.control.send_replace(());
            self.inner.emit_state_change(turn);
        }
        turn
    }

    /// Wakes a paused run; a no-op otherwise.
    pub fn resume(&self) {
        let (turn, transitioned) = {
            let mut state = self.inner.state.lock();
            let transitioned = state.processing && state.paused;
            if transitioned {
                state.paused = false;
            }
            (state.turn, transitioned)
        };
        if transitioned {
            info!(turn, "resuming simulation");
            self.inner.control.send_replace(());
            self.inner.emit_state_change(turn);
        }
    }

    /// Requests the current run to halt after the turn in flight.
    /// Idempotent; observed even while paused.
    pub fn stop(&self) {
        {
            let mut state = self.inner.state.lock();
            state.stop_requested = true;
        }
        self.inner.control.send_replace(());
    }

    /// Stops any run, releases all worker connections, and signals the
    /// control server to exit. Idempotent.
    pub async fn shutdown(&self) {
        let turn = {
            let mut state = self.inner.state.lock();
            state.stop_requested = true;
            state.shutting_down = true;
            state.turn
        };
        self.inner.control.send_replace(());
        self.wait_until_idle().await;
        self.inner.pool.disconnect_all().await;
        self.inner.emit_state_change(turn);
        self.inner.shutdown.send_replace(true);
        info!("coordinator shut down");
    }

    /// Consistent snapshot of the fully merged grid; never observes a
    /// partial turn.
    pub fn get_world(&self) -> WorldSnapshot {
        let state = self.inner.state.lock();
        WorldSnapshot {
            grid: state.grid.clone(),
            turn: state.turn,
            processing: state.processing,
        }
    }

    pub fn alive_cells_count(&self) -> (u32, usize) {
        let state = self.inner.state.lock();
        (state.turn, state.grid.alive_count())
    }

    /// Drains the changed-cell list of the last completed turn, so a
    /// poller sees each flip exactly once.
    pub fn turn_updates(&self) -> (u32, Vec<Cell>) {
        let mut state = self.inner.state.lock();
        let changed = std::mem::take(&mut state.changed);
        (state.turn, changed)
    }
}
