use clap::Parser;

/// CLI for the coordinator daemon.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "torus-coordinator",
    about = "Distributes Game of Life turns across a pool of torus workers"
)]
pub struct Cli {
    /// Listen address for the control plane
    #[arg(long, env = "TORUS_COORD_ADDR", default_value = "127.0.0.1:8030")]
    pub listen_addr: String,

    /// Worker addresses (repeat the flag or comma-separate)
    #[arg(
        long = "worker",
        env = "TORUS_WORKERS",
        value_delimiter = ',',
        required = true
    )]
    pub workers: Vec<String>,

    /// Seconds between liveness sweeps
    #[arg(long, env = "TORUS_HEARTBEAT_INTERVAL", default_value = "5")]
    pub heartbeat_interval_secs: u64,

    /// Seconds before an in-flight worker call times out
    #[arg(long, env = "TORUS_CALL_TIMEOUT", default_value = "10")]
    pub call_timeout_secs: u64,

    /// Consecutive failures before a worker is marked dead
    #[arg(long, env = "TORUS_FAILURE_THRESHOLD", default_value = "3")]
    pub failure_threshold: u32,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,
}
