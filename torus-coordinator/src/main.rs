use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use torus_coordinator::pool::WorkerPool;
use torus_coordinator::{cli, monitor, server, Coordinator, CoordinatorConfig};

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    let config = CoordinatorConfig::from_cli(&cli)?;
    let pool = WorkerPool::new(config.worker_addrs.clone(), config.failure_threshold);
    pool.connect_all(config.call_timeout).await;

    let coordinator = Coordinator::new(config.clone(), pool.clone());
    tokio::spawn(monitor::run(
        pool,
        config.heartbeat_interval,
        config.call_timeout,
        coordinator.shutdown_signal(),
    ));

    let listener = TcpListener::bind(&config.listen_addr).await?;
    server::serve(coordinator, listener).await
}
