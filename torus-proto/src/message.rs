//! Typed request/response messages, one enum per role.

use serde::{Deserialize, Serialize};
use torus_types::{Cell, Grid, Slab};

/// Calls the coordinator makes on a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerRequest {
    /// Compute the next generation of a slab's interior rows.
    ComputeNextState { slab: Slab, width: u16 },
    /// Liveness probe.
    Heartbeat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerResponse {
    NextState {
        rows: Vec<Vec<u8>>,
        changed: Vec<Cell>,
    },
    HeartbeatAck,
    Error {
        message: String,
    },
}

/// Calls an external controller makes on the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlRequest {
    /// Start (or restart) a simulation run.
    Process { grid: Grid, turns: u32 },
    Pause,
    Resume,
    Stop,
    Shutdown,
    GetWorld,
    GetAliveCellsCount,
    /// Drain the changed-cell list for the last completed turn.
    GetTurnUpdates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub grid: Grid,
    pub turn: u32,
    pub processing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlResponse {
    Ack,
    Paused { turn: u32 },
    World(WorldSnapshot),
    AliveCells { turn: u32, count: usize },
    TurnUpdates { turn: u32, changed: Vec<Cell> },
    Error { message: String },
}
