//! Job driver: decompose, scatter, run every worker, gather
//!
//! Rank 0 in the original job layout. It hands each worker its padded
//! sub-grid once, then stays out of the way until the workers finish.

use crate::comm::ChannelNetwork;
use crate::core::config::EngineConfig;
use crate::core::error::{LifeError, Result};
use crate::core::types::{Cell, Rank};
use crate::grid::GlobalGrid;
use crate::partition::Decomposition;
use crate::simulation::{Worker, WorkerReport};
use serde::Serialize;
use std::time::Instant;
use tokio::task::JoinSet;

/// One worker's share of the initial grid
#[derive(Debug, Clone)]
pub struct Assignment {
    pub rank: Rank,
    pub padded: Vec<Cell>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub grid_size: usize,
    pub iterations: u64,
    pub workers_requested: usize,
    pub workers_used: usize,
    pub idle_ranks: Vec<Rank>,
    pub width_chunks: usize,
    pub height_chunks: usize,
    pub messages_sent: usize,
    pub messages_received: usize,
    pub initial_population: usize,
    pub final_population: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub grid: GlobalGrid,
    pub workers: Vec<WorkerReport>,
}

/// Decomposition for `workers` processes, checked cell by cell
pub fn plan(grid_size: usize, workers: usize) -> Result<Decomposition> {
    let decomposition = Decomposition::for_workers(grid_size, workers)?;
    decomposition.verify()?;
    Ok(decomposition)
}

pub fn scatter(grid: &GlobalGrid, decomposition: &Decomposition) -> Result<Vec<Assignment>> {
    if grid.size() != decomposition.grid_size() {
        return Err(LifeError::Config(format!(
            "grid is {0}x{0} but the decomposition expects size {1}",
            grid.size(),
            decomposition.grid_size()
        )));
    }
    Ok(decomposition
        .partitions()
        .map(|partition| Assignment {
            rank: partition.rank,
            padded: grid.padded_subgrid(&partition),
        })
        .collect())
}

pub fn gather(grid_size: usize, reports: &[WorkerReport]) -> Result<GlobalGrid> {
    let mut grid = GlobalGrid::new(grid_size);
    for report in reports {
        grid.insert_region(&report.partition, &report.cells)?;
    }
    Ok(grid)
}

/// Evolve `grid` for `iterations` generations across `config.workers` workers
///
/// The first worker failure aborts the remaining workers and is returned.
pub async fn run(grid: &GlobalGrid, iterations: u64, config: &EngineConfig) -> Result<RunReport> {
    config.validate()?;
    if iterations == 0 {
        return Err(LifeError::Config("iteration count must be positive".into()));
    }

    let started = Instant::now();
    let decomposition = plan(grid.size(), config.workers)?;
    let workers_used = decomposition.worker_count();
    let idle_ranks: Vec<Rank> = (workers_used + 1..=config.workers).collect();

    tracing::info!(
        grid_size = grid.size(),
        width_chunks = decomposition.width_chunks(),
        height_chunks = decomposition.height_chunks(),
        workers = workers_used,
        iterations,
        "starting run"
    );
    if !idle_ranks.is_empty() {
        tracing::info!(?idle_ranks, "ranks without a partition stay idle");
    }

    let mut network = ChannelNetwork::new(workers_used, config.recv_timeout());
    let mut tasks = JoinSet::new();
    for assignment in scatter(grid, &decomposition)? {
        let transport = network.endpoint(assignment.rank)?;
        let worker = Worker::new(&decomposition, assignment.padded, transport, config)?;
        tasks.spawn(worker.run(iterations));
    }

    let mut reports = Vec::with_capacity(workers_used);
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(|e| LifeError::Worker(e.to_string()))
            .and_then(|result| result);
        match outcome {
            Ok(report) => reports.push(report),
            Err(e) => {
                tracing::error!(error = %e, "worker failed, aborting run");
                tasks.abort_all();
                return Err(e);
            }
        }
    }
    reports.sort_by_key(|report| report.rank);

    let final_grid = gather(grid.size(), &reports)?;
    let summary = RunSummary {
        grid_size: grid.size(),
        iterations,
        workers_requested: config.workers,
        workers_used,
        idle_ranks,
        width_chunks: decomposition.width_chunks(),
        height_chunks: decomposition.height_chunks(),
        messages_sent: reports.iter().map(|r| r.messages_sent).sum(),
        messages_received: reports.iter().map(|r| r.messages_received).sum(),
        initial_population: grid.population(),
        final_population: final_grid.population(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };

    tracing::info!(
        final_population = summary.final_population,
        elapsed_ms = summary.elapsed_ms,
        "run complete"
    );

    Ok(RunReport {
        summary,
        grid: final_grid,
        workers: reports,
    })
}
