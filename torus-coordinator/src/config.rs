use std::time::Duration;

use anyhow::{ensure, Result};

use crate::cli::Cli;

/// Runtime configuration derived from CLI/env.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub listen_addr: String,
    pub worker_addrs: Vec<String>,
    pub heartbeat_interval: Duration,
    pub call_timeout: Duration,
    pub failure_threshold: u32,
}

impl CoordinatorConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        ensure!(!cli.workers.is_empty(), "at least one worker address is required");
        ensure!(cli.failure_threshold > 0, "failure threshold must be positive");
        Ok(Self {
            listen_addr: cli.listen_addr.clone(),
            worker_addrs: cli.workers.clone(),
            heartbeat_interval: Duration::from_secs(cli.heartbeat_interval_secs),
            call_timeout: Duration::from_secs(cli.call_timeout_secs),
            failure_threshold: cli.failure_threshold,
        })
    }
}
