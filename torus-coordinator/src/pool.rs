//! Worker proxies and the shared pool.
//!
//! Each remote worker is represented by one [`WorkerProxy`] holding its
//! address, liveness status, and RPC connection. Liveness status lives
//! behind a short-lived sync lock shared by the turn loop and the
//! liveness monitor; the connection sits behind an async lock because a
//! call holds it across the await.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};

use torus_proto::{ProtoError, WorkerClient};
use torus_types::{Cell, Slab};

#[derive(Debug)]
struct ProxyStatus {
    alive: bool,
    consecutive_failures: u32,
}

/// Coordinator-side handle for one worker.
pub struct WorkerProxy {
    id: usize,
    addr: String,
    failure_threshold: u32,
    status: Mutex<ProxyStatus>,
    conn: tokio::sync::Mutex<Option<WorkerClient>>,
}

impl WorkerProxy {
    fn new(id: usize, addr: String, failure_threshold: u32) -> Self {
        Self {
            id,
            addr,
            failure_threshold,
            status: Mutex::new(ProxyStatus {
                alive: false,
                consecutive_failures: 0,
            }),
            conn: tokio::sync::Mutex::new(None),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_alive(&self) -> bool {
        self.status.lock().alive
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.status.lock().consecutive_failures
    }

    /// One successful heartbeat or compute call fully rehabilitates the
    /// worker: alive again, failure count cleared.
    pub fn record_success(&self) {
        let mut status = self.status.lock();
        if !status.alive {
            info!(worker = self.id, addr = %self.addr, "worker promoted to alive");
        }
        status.alive = true;
        status.consecutive_failures = 0;
    }

    /// Counts one failure; at the threshold the worker is demoted and
    /// its connection released. Returns true when this call demoted it.
    pub async fn record_failure(&self) -> bool {
        let demoted = {
            let mut status = self.status.lock();
            status.consecutive_failures += 1;
            if status.alive && status.consecutive_failures >= self.failure_threshold {
                status.alive = false;
                true
            } else {
                false
            }
        };
        if demoted {
            warn!(
                worker = self.id,
                addr = %self.addr,
                threshold = self.failure_threshold,
                "worker demoted to dead"
            );
            self.conn.lock().await.take();
        }
        demoted
    }

    /// Dials the worker and, on success, promotes it.
    pub async fn reconnect(&self, timeout: Duration) -> Result<(), ProtoError> {
        let client = match tokio::time::timeout(timeout, WorkerClient::connect(&self.addr)).await {
            Ok(Ok(client)) => client,
            Ok(Err(err)) => return Err(err),
            Err(_) => return Err(ProtoError::Timeout),
        };
        *self.conn.lock().await = Some(client);
        self.record_success();
        Ok(())
    }

    /// Reuses the held connection or dials a fresh one.
    async fn ensure_client<'a>(
        &self,
        conn: &'a mut Option<WorkerClient>,
    ) -> Result<&'a mut WorkerClient, ProtoError> {
        match conn.take() {
            Some(client) => Ok(conn.insert(client)),
            None => Ok(conn.insert(WorkerClient::connect(&self.addr).await?)),
        }
    }

    /// Sends one compute call, dialing first if no connection is held.
    /// Any failure drops the connection, since the stream may be left
    /// mid-frame.
    pub async fn compute(
        &self,
        slab: Slab,
        width: u16,
        timeout: Duration,
    ) -> Result<(Vec<Vec<u8>>, Vec<Cell>), ProtoError> {
        let mut conn = self.conn.lock().await;
        let client = self.ensure_client(&mut conn).await?;
        match tokio::time::timeout(timeout, client.compute_next_state(slab, width)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => {
                conn.take();
                Err(err)
            }
            Err(_) => {
                conn.take();
                Err(ProtoError::Timeout)
            }
        }
    }

    /// Sends one heartbeat over the held connection.
    pub async fn heartbeat(&self, timeout: Duration) -> Result<(), ProtoError> {
        let mut conn = self.conn.lock().await;
        let client = self.ensure_client(&mut conn).await?;
        match tokio::time::timeout(timeout, client.heartbeat()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                conn.take();
                Err(err)
            }
            Err(_) => {
                conn.take();
                Err(ProtoError::Timeout)
            }
        }
    }

    async fn disconnect(&self) {
        {
            let mut status = self.status.lock();
            status.alive = false;
        }
        self.conn.lock().await.take();
    }
}

/// The set of worker proxies, shared between the turn coordinator and
/// the liveness monitor.
pub struct WorkerPool {
    workers: Vec<Arc<WorkerProxy>>,
}

impl WorkerPool {
    pub fn new(addrs: Vec<String>, failure_threshold: u32) -> Arc<Self> {
        let workers = addrs
            .into_iter()
            .enumerate()
            .map(|(id, addr)| Arc::new(WorkerProxy::new(id, addr, failure_threshold)))
            .collect();
        Arc::new(Self { workers })
    }

    /// Initial dial of every worker. Unreachable workers stay dead and
    /// are retried by the liveness monitor.
    pub async fn connect_all(&self, timeout: Duration) {
        for proxy in &self.workers {
            match proxy.reconnect(timeout).await {
                Ok(()) => info!(worker = proxy.id(), addr = %proxy.addr(), "worker connected"),
                Err(err) => {
                    warn!(worker = proxy.id(), addr = %proxy.addr(), %err, "worker unreachable")
                }
            }
        }
    }

    pub fn all(&self) -> &[Arc<WorkerProxy>] {
        &self.workers
    }

    /// Snapshot of the currently live workers, in id order.
    pub fn live_workers(&self) -> Vec<Arc<WorkerProxy>> {
        self.workers
            .iter()
            .filter(|proxy| proxy.is_alive())
            .cloned()
            .collect()
    }

    /// Releases every connection and marks all workers dead.
    pub async fn disconnect_all(&self) {
        for proxy in &self.workers {
            proxy.disconnect().await;
        }
    }
}
