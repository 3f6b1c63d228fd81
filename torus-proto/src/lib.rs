//! Wire protocol for the torus cluster.
//!
//! All traffic (coordinator to worker, controller to coordinator) runs
//! over plain TCP as length-prefixed JSON frames, with one typed
//! request/response enum per role. A connection carries strictly
//! alternating request/response pairs.

mod client;
mod frame;
mod message;

pub use client::{ControlClient, WorkerClient};
pub use frame::{read_frame, write_frame, MAX_FRAME_LEN};
pub use message::{ControlRequest, ControlResponse, WorkerRequest, WorkerResponse, WorldSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(usize),

    #[error("connection closed by peer")]
    Closed,

    #[error("call timed out")]
    Timeout,

    #[error("peer sent a response of the wrong kind")]
    UnexpectedResponse,

    #[error("remote error: {0}")]
    Remote(String),
}
