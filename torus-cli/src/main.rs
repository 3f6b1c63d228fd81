//! # torus CLI
//!
//! Operator client for the torus coordinator: starts simulations from
//! PGM grid files, drives pause/resume/stop/shutdown, and snapshots or
//! watches a running world.

mod pgm;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use torus_proto::ControlClient;

#[derive(Parser)]
#[command(name = "torus")]
#[command(about = "Control client for the torus coordinator", long_about = None)]
struct Cli {
    /// Coordinator control-plane address
    #[arg(long, env = "TORUS_COORD_ADDR", default_value = "127.0.0.1:8030")]
    coordinator: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start (or restart) a simulation from a PGM grid file
    Process {
        /// Path to the seed grid
        grid: PathBuf,

        /// Number of turns to simulate
        #[arg(long, default_value_t = 100)]
        turns: u32,
    },

    /// Pause the running simulation
    Pause,

    /// Resume a paused simulation
    Resume,

    /// Stop the current run, keeping the coordinator alive
    Stop,

    /// Stop everything and terminate the coordinator
    Shutdown,

    /// Fetch the current world and write it as a PGM snapshot
    World {
        /// Directory for the snapshot file
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Report the live-cell count
    Alive,

    /// Poll alive counts and cell flips until the run completes
    Watch {
        /// Seconds between polls
        #[arg(long, default_value_t = 2)]
        interval_secs: u64,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut client = ControlClient::connect(&cli.coordinator)
        .await
        .with_context(|| format!("connecting to coordinator at {}", cli.coordinator))?;
    tracing::debug!(coordinator = %cli.coordinator, "connected");

    match cli.command {
        Commands::Process { grid, turns } => {
            let grid = pgm::read_grid(&grid).with_context(|| format!("reading {}", grid.display()))?;
            client.process(grid.clone(), turns).await?;
            println!(
                "processing {}x{} grid for {turns} turns",
                grid.width(),
                grid.height()
            );
        }
        Commands::Pause => {
            let turn = client.pause().await?;
            println!("paused at turn {turn}");
        }
        Commands::Resume => {
            client.resume().await?;
            println!("resumed");
        }
        Commands::Stop => {
            client.stop().await?;
            println!("stop requested");
        }
        Commands::Shutdown => {
            client.shutdown().await?;
            println!("coordinator shut down");
        }
        Commands::World { out } => {
            let world = client.get_world().await?;
            let path = pgm::write_grid(&world.grid, &out, world.turn)?;
            println!(
                "turn {} (processing: {}) written to {}",
                world.turn,
                world.processing,
                path.display()
            );
        }
        Commands::Alive => {
            let (turn, count) = client.get_alive_cells_count().await?;
            println!("turn {turn}: {count} cells alive");
        }
        Commands::Watch { interval_secs } => {
            watch(&mut client, Duration::from_secs(interval_secs)).await?;
        }
    }
    Ok(())
}

async fn watch(client: &mut ControlClient, interval: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let (turn, count) = client.get_alive_cells_count().await?;
        let (_, changed) = client.get_turn_updates().await?;
        println!(
            "turn {turn}: {count} alive, {} flips since last poll",
            changed.len()
        );
        if !client.get_world().await?.processing {
            println!("run complete at turn {turn}");
            return Ok(());
        }
    }
}
