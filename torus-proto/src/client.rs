//! Typed RPC clients, one per role.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::frame::{read_frame, write_frame};
use crate::message::{
    ControlRequest, ControlResponse, WorkerRequest, WorkerResponse, WorldSnapshot,
};
use crate::ProtoError;
use torus_types::{Cell, Grid, Slab};

/// One connection, one in-flight call at a time.
struct RpcConnection {
    stream: TcpStream,
}

impl RpcConnection {
    async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ProtoError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    async fn call<Req, Resp>(&mut self, request: &Req) -> Result<Resp, ProtoError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        write_frame(&mut self.stream, request).await?;
        read_frame(&mut self.stream).await
    }
}

/// Client for the worker role ([`WorkerRequest`]).
pub struct WorkerClient {
    conn: RpcConnection,
}

impl WorkerClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ProtoError> {
        Ok(Self {
            conn: RpcConnection::connect(addr).await?,
        })
    }

    pub async fn compute_next_state(
        &mut self,
        slab: Slab,
        width: u16,
    ) -> Result<(Vec<Vec<u8>>, Vec<Cell>), ProtoError> {
        let request = WorkerRequest::ComputeNextState { slab, width };
        match self.conn.call(&request).await? {
            WorkerResponse::NextState { rows, changed } => Ok((rows, changed)),
            WorkerResponse::Error { message } => Err(ProtoError::Remote(message)),
            WorkerResponse::HeartbeatAck => Err(ProtoError::UnexpectedResponse),
        }
    }

    pub async fn heartbeat(&mut self) -> Result<(), ProtoError> {
        match self.conn.call(&WorkerRequest::Heartbeat).await? {
            WorkerResponse::HeartbeatAck => Ok(()),
            WorkerResponse::Error { message } => Err(ProtoError::Remote(message)),
            WorkerResponse::NextState { .. } => Err(ProtoError::UnexpectedResponse),
        }
    }
}

/// Client for the coordinator's control plane ([`ControlRequest`]).
pub struct ControlClient {
    conn: RpcConnection,
}

impl ControlClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ProtoError> {
        Ok(Self {
            conn: RpcConnection::connect(addr).await?,
        })
    }

    async fn call(&mut self, request: &ControlRequest) -> Result<ControlResponse, ProtoError> {
        match self.conn.call(request).await? {
            ControlResponse::Error { message } => Err(ProtoError::Remote(message)),
            response => Ok(response),
        }
    }

    pub async fn process(&mut self, grid: Grid, turns: u32) -> Result<(), ProtoError> {
        match self.call(&ControlRequest::Process { grid, turns }).await? {
            ControlResponse::Ack => Ok(()),
            _ => Err(ProtoError::UnexpectedResponse),
        }
    }

    /// Returns the last fully completed turn at which the pause took effect.
    pub async fn pause(&mut self) -> Result<u32, ProtoError> {
        match self.call(&ControlRequest::Pause).await? {
            ControlResponse::Paused { turn } => Ok(turn),
            _ => Err(ProtoError::UnexpectedResponse),
        }
    }

    pub async fn resume(&mut self) -> Result<(), ProtoError> {
        match self.call(&ControlRequest::Resume).await? {
            ControlResponse::Ack => Ok(()),
            _ => Err(ProtoError::UnexpectedResponse),
        }
    }

    pub async fn stop(&mut self) -> Result<(), ProtoError> {
        match self.call(&ControlRequest::Stop).await? {
            ControlResponse::Ack => Ok(()),
            _ => Err(ProtoError::UnexpectedResponse),
        }
    }

    pub async fn shutdown(&mut self) -> Result<(), ProtoError> {
        match self.call(&ControlRequest::Shutdown).await? {
            ControlResponse::Ack => Ok(()),
            _ => Err(ProtoError::UnexpectedResponse),
        }
    }

    pub async fn get_world(&mut self) -> Result<WorldSnapshot, ProtoError> {
        match self.call(&ControlRequest::GetWorld).await? {
            ControlResponse::World(snapshot) => Ok(snapshot),
            _ => Err(ProtoError::UnexpectedResponse),
        }
    }

    pub async fn get_alive_cells_count(&mut self) -> Result<(u32, usize), ProtoError> {
        match self.call(&ControlRequest::GetAliveCellsCount).await? {
            ControlResponse::AliveCells { turn, count } => Ok((turn, count)),
            _ => Err(ProtoError::UnexpectedResponse),
        }
    }

    pub async fn get_turn_updates(&mut self) -> Result<(u32, Vec<Cell>), ProtoError> {
        match self.call(&ControlRequest::GetTurnUpdates).await? {
            ControlResponse::TurnUpdates { turn, changed } => Ok((turn, changed)),
            _ => Err(ProtoError::UnexpectedResponse),
        }
    }
}
