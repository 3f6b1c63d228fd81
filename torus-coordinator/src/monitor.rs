//! Background liveness monitor.
//!
//! Runs on a fixed interval, independently of turn execution: live
//! workers get a heartbeat, dead workers get a reconnection attempt.
//! Either path can race a direct call failure in the turn loop; both
//! funnel through the same proxy status, so whichever observes the
//! failure first wins.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::pool::WorkerPool;

pub async fn run(
    pool: Arc<WorkerPool>,
    interval: Duration,
    call_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => sweep(&pool, call_timeout).await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("liveness monitor stopped");
}

async fn sweep(pool: &WorkerPool, call_timeout: Duration) {
    for proxy in pool.all() {
        if proxy.is_alive() {
            match proxy.heartbeat(call_timeout).await {
                Ok(()) => proxy.record_success(),
                Err(err) => {
                    debug!(worker = proxy.id(), %err, "heartbeat failed");
                    proxy.record_failure().await;
                }
            }
        } else {
            match proxy.reconnect(call_timeout).await {
                // reconnect promotes the proxy itself
                Ok(()) => {}
                Err(err) => debug!(worker = proxy.id(), %err, "worker still unreachable"),
            }
        }
    }
}
