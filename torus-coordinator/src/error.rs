use torus_proto::ProtoError;
use torus_types::GridError;

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// A turn or redistribution attempt found no live worker to assign
    /// to. Fatal to the current run, not to the coordinator.
    #[error("no live workers available")]
    NoWorkersAvailable,

    #[error("worker {worker} call failed: {source}")]
    WorkerCallFailed {
        worker: usize,
        #[source]
        source: ProtoError,
    },

    /// A worker answered with rows that do not fit its partition; a
    /// protocol violation treated like a failed call.
    #[error("worker {worker} returned {got_rows} rows for a {expected_rows}-row partition")]
    InvalidDimensions {
        worker: usize,
        got_rows: usize,
        expected_rows: usize,
    },

    #[error("rejecting grid: {0}")]
    InvalidGrid(#[from] GridError),

    #[error("coordinator is shutting down")]
    ShuttingDown,

    #[error("dispatch task panicked: {0}")]
    TaskPanicked(String),
}
