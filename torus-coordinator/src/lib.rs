//! Coordinator for the torus distributed Game of Life.
//!
//! The coordinator owns the global grid and drives the simulation one
//! turn at a time: it partitions the grid by row ranges across the live
//! worker set, fans the slabs out over RPC, joins all responses, merges
//! them into the next generation, and only then lets the control plane
//! observe the new state. A liveness monitor heartbeats workers in the
//! background, and work assigned to a worker that fails mid-turn is
//! redistributed among the survivors within the same turn.

pub mod cli;
pub mod config;
mod coordinator;
mod error;
pub mod monitor;
pub mod partition;
pub mod pool;
pub mod server;
mod state;
mod turn;

pub use config::CoordinatorConfig;
pub use coordinator::Coordinator;
pub use error::CoordinatorError;
pub use state::{ControlState, SimEvent};
