//! Control-plane TCP server.

use anyhow::Result;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use torus_proto::{read_frame, write_frame, ControlRequest, ControlResponse, ProtoError};

use crate::coordinator::Coordinator;

/// Accepts controller connections until `Shutdown` is observed.
pub async fn serve(coordinator: Coordinator, listener: TcpListener) -> Result<()> {
    let mut shutdown = coordinator.shutdown_signal();
    info!(addr = %listener.local_addr()?, "torus-coordinator listening");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                debug!(%peer, "controller connected");
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    match handle_connection(coordinator, stream).await {
                        Ok(()) => debug!(%peer, "controller disconnected"),
                        Err(err) => warn!(%peer, %err, "control connection ended with error"),
                    }
                });
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("control server stopped");
    Ok(())
}

async fn handle_connection(
    coordinator: Coordinator,
    mut stream: TcpStream,
) -> Result<(), ProtoError> {
    loop {
        let request = match read_frame::<_, ControlRequest>(&mut stream).await {
            Ok(request) => request,
            Err(ProtoError::Closed) => return Ok(()),
            Err(err) => return Err(err),
        };
        let response = dispatch(&coordinator, request).await;
        write_frame(&mut stream, &response).await?;
    }
}

async fn dispatch(coordinator: &Coordinator, request: ControlRequest) -> ControlResponse {
    match request {
        ControlRequest::Process { grid, turns } => {
            match coordinator.process(grid, turns).await {
                Ok(()) => ControlResponse::Ack,
                Err(err) => ControlResponse::Error {
                    message: err.to_string(),
                },
            }
        }
        ControlRequest::Pause => ControlResponse::Paused {
            turn: coordinator.pause(),
        },
        ControlRequest::Resume => {
            coordinator.resume();
            ControlResponse::Ack
        }
        ControlRequest::Stop => {
            coordinator.stop();
            ControlResponse::Ack
        }
        ControlRequest::Shutdown => {
            coordinator.shutdown().await;
            ControlResponse::Ack
        }
        ControlRequest::GetWorld => ControlResponse::World(coordinator.get_world()),
        ControlRequest::GetAliveCellsCount => {
            let (turn, count) = coordinator.alive_cells_count();
            ControlResponse::AliveCells { turn, count }
        }
        ControlRequest::GetTurnUpdates => {
            let (turn, changed) = coordinator.turn_updates();
            ControlResponse::TurnUpdates { turn, changed }
        }
    }
}
