//! Simulation state owned by the coordinator.

use torus_types::{Cell, Grid};

/// Externally visible lifecycle of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Idle,
    Running,
    Paused,
    ShuttingDown,
}

impl std::fmt::Display for ControlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ControlState::Idle => "idle",
            ControlState::Running => "running",
            ControlState::Paused => "paused",
            ControlState::ShuttingDown => "shutting-down",
        };
        f.write_str(name)
    }
}

/// Mutable simulation state. Writes happen only under the coordinator's
/// lock; the control plane reads snapshots.
#[derive(Debug, Default)]
pub(crate) struct SimState {
    pub grid: Grid,
    pub turn: u32,
    pub total_turns: u32,
    pub processing: bool,
    pub paused: bool,
    pub stop_requested: bool,
    pub shutting_down: bool,
    /// Cells flipped by the last completed turn, drained by
    /// `GetTurnUpdates`.
    pub changed: Vec<Cell>,
}

impl SimState {
    pub fn control_state(&self) -> ControlState {
        if self.shutting_down {
            ControlState::ShuttingDown
        } else if !self.processing {
            ControlState::Idle
        } else if self.paused {
            ControlState::Paused
        } else {
            ControlState::Running
        }
    }
}

/// Notifications produced as the simulation advances, for display or
/// logging consumers.
#[derive(Debug, Clone)]
pub enum SimEvent {
    TurnComplete { turn: u32, changed: Vec<Cell> },
    AliveCount { turn: u32, count: usize },
    StateChange { turn: u32, state: ControlState },
}
