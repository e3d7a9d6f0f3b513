//! Halo Life - Entry Point
//!
//! Loads the initial grid, runs the distributed simulation on an in-process
//! worker network, and writes the final grid.

use clap::Parser;
use halo_life::coordinator;
use halo_life::core::config::EngineConfig;
use halo_life::core::error::{LifeError, Result};
use halo_life::grid::GlobalGrid;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

/// Toroidal Game of Life split across message-passing workers
#[derive(Parser, Debug)]
#[command(name = "halo-life")]
#[command(about = "Evolve an N x N toroidal Game of Life grid across domain-decomposed workers")]
struct Args {
    /// Grid size N
    grid_size: usize,

    /// Input grid: N lines of N symbols, 'X' alive and '.' dead (ignored with --random)
    input: PathBuf,

    /// Number of generations to run
    iterations: u64,

    /// Where to write the final grid (stdout when omitted)
    output: Option<PathBuf>,

    /// Worker processes, excluding the coordinator
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// TOML file with engine settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Receive timeout in milliseconds
    #[arg(long)]
    recv_timeout_ms: Option<u64>,

    /// Summary format: text or json
    #[arg(long, default_value = "text")]
    format: String,

    /// Generate a random initial grid with this live-cell density instead of reading INPUT
    #[arg(long)]
    random: Option<f64>,

    /// Seed for --random
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("halo_life=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(timeout) = args.recv_timeout_ms {
        config.recv_timeout_ms = timeout;
    }
    config.validate()?;

    let grid = match args.random {
        Some(density) => {
            if !(0.0..=1.0).contains(&density) {
                return Err(LifeError::Config(format!(
                    "density must be within [0, 1], got {density}"
                )));
            }
            let seed = args.seed.unwrap_or_else(rand::random);
            tracing::info!(density, seed, "generating random grid");
            GlobalGrid::random(args.grid_size, density, seed)?
        }
        None => {
            let text = fs::read_to_string(&args.input)?;
            GlobalGrid::parse(&text, args.grid_size)?
        }
    };
    tracing::info!(
        grid_size = grid.size(),
        population = grid.population(),
        "successfully finished reading input"
    );

    let rt = Runtime::new()?;
    let report = rt.block_on(coordinator::run(&grid, args.iterations, &config))?;

    let rendered = report.grid.to_string();
    match &args.output {
        Some(path) => fs::write(path, rendered)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
        }
    }

    let summary = &report.summary;
    if args.format == "json" {
        eprintln!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        eprintln!(
            "{} generations on {}x{} grid: {} workers ({}x{}), {} idle",
            summary.iterations,
            summary.grid_size,
            summary.grid_size,
            summary.workers_used,
            summary.width_chunks,
            summary.height_chunks,
            summary.idle_ranks.len()
        );
        eprintln!(
            "population {} -> {}, {} messages, {} ms",
            summary.initial_population,
            summary.final_population,
            summary.messages_sent,
            summary.elapsed_ms
        );
    }

    Ok(())
}
