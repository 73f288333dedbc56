use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use slugsim_app::TerminalRenderer;
use slugsim_core::{SlugSimConfig, World};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "slugsim", version, about = "Slugs wandering a terminal grid")]
struct Cli {
    /// Append log lines to this file, keeping the alternate screen clean.
    #[arg(long, default_value = "log")]
    log_file: PathBuf,

    /// Seed of the simulation.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Milliseconds between ticks, the speed of the simulation.
    #[arg(long, default_value_t = 100)]
    tick_interval: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_file)?;

    let config = SlugSimConfig {
        rng_seed: cli.seed,
        tick_interval: Duration::from_millis(cli.tick_interval),
    };
    let world = World::new(config.clone()).context("failed to construct world")?;

    info!(
        seed = config.rng_seed,
        tick_interval_ms = cli.tick_interval,
        "----- starting simulation -----"
    );
    TerminalRenderer::new(config.tick_interval).run(world)?;
    info!("----- simulation ended -----");
    Ok(())
}

fn init_tracing(log_file: &Path) -> Result<()> {
    let file = File::options()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open log file {}", log_file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
