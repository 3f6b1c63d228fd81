use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Torus worker daemon. Computes next-generation grid slabs on behalf of
/// the coordinator.
#[derive(Debug, Parser)]
#[command(name = "torus-worker", about = "Slab compute worker for the torus cluster")]
struct Cli {
    /// Address to listen on for coordinator connections
    #[arg(long, env = "TORUS_WORKER_ADDR", default_value = "127.0.0.1:8031")]
    listen_addr: String,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let listener = TcpListener::bind(&cli.listen_addr).await?;
    torus_worker::serve(listener).await
}
