//! Worker daemon for the torus cluster.
//!
//! Serves the worker role of the wire protocol: `ComputeNextState` runs
//! the pure slab step from `torus-engine`, `Heartbeat` answers liveness
//! probes. The daemon keeps no state between requests, so the coordinator
//! is free to retry or reassign work after a failure.

use anyhow::Result;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use torus_proto::{read_frame, write_frame, ProtoError, WorkerRequest, WorkerResponse};

/// Accepts connections forever, one task per coordinator connection.
pub async fn serve(listener: TcpListener) -> Result<()> {
    info!(addr = %listener.local_addr()?, "torus-worker listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "coordinator connected");
        tokio::spawn(async move {
            match handle_connection(stream).await {
                Ok(()) => debug!(%peer, "coordinator disconnected"),
                Err(err) => warn!(%peer, %err, "connection ended with error"),
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream) -> Result<(), ProtoError> {
    loop {
        let request = match read_frame::<_, WorkerRequest>(&mut stream).await {
            Ok(request) => request,
            Err(ProtoError::Closed) => return Ok(()),
            Err(err) => return Err(err),
        };
        let response = handle_request(request);
        write_frame(&mut stream, &response).await?;
    }
}

fn handle_request(request: WorkerRequest) -> WorkerResponse {
    match request {
        WorkerRequest::ComputeNextState { slab, width } => {
            match torus_engine::next_slab_state(&slab, width) {
                Ok((rows, changed)) => WorkerResponse::NextState { rows, changed },
                Err(err) => {
                    warn!(%err, start = slab.start_row, end = slab.end_row, "rejecting slab");
                    WorkerResponse::Error {
                        message: err.to_string(),
                    }
                }
            }
        }
        WorkerRequest::Heartbeat => WorkerResponse::HeartbeatAck,
    }
}
