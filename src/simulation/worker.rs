//! The per-worker generation loop: exchange, update, swap

use crate::comm::Transport;
use crate::core::config::EngineConfig;
use crate::core::error::Result;
use crate::core::types::{Cell, Rank, Tag};
use crate::grid::{DoubleBuffer, LocalBuffer};
use crate::partition::{Decomposition, Partition};
use crate::simulation::halo::{ExchangeStats, HaloExchange, HaloPlan};
use crate::simulation::update::UpdateEngine;
use serde::Serialize;
use tokio::runtime::RuntimeFlavor;

/// What a worker hands back once its iterations are done
#[derive(Debug, Clone, Serialize)]
pub struct WorkerReport {
    pub rank: Rank,
    pub partition: Partition,
    pub generations: u64,
    pub messages_sent: usize,
    pub messages_received: usize,
    /// Owned region, row-major, for the gather step
    #[serde(skip)]
    pub cells: Vec<Cell>,
}

pub struct Worker<T: Transport> {
    partition: Partition,
    buffers: DoubleBuffer,
    halo: HaloExchange,
    engine: UpdateEngine,
    transport: T,
    generation: Tag,
    messages_sent: usize,
    messages_received: usize,
}

impl<T: Transport> Worker<T> {
    /// Set up a worker from its scattered, halo-padded sub-grid
    pub fn new(
        decomposition: &Decomposition,
        padded: Vec<Cell>,
        transport: T,
        config: &EngineConfig,
    ) -> Result<Self> {
        let partition = decomposition.partition(transport.rank())?;
        let buffer =
            LocalBuffer::from_cells(partition.padded_height(), partition.padded_width(), padded)?;
        let plan = HaloPlan::new(decomposition, &partition);

        tracing::debug!(
            rank = partition.rank,
            rows = ?(partition.row_start..partition.row_end),
            cols = ?(partition.col_start..partition.col_end),
            neighbors = ?plan.neighbors(),
            "worker partition ready"
        );

        Ok(Self {
            partition,
            buffers: DoubleBuffer::new(buffer),
            halo: HaloExchange::new(plan),
            engine: UpdateEngine::new(config.parallel_threshold),
            transport,
            generation: 0,
            messages_sent: 0,
            messages_received: 0,
        })
    }

    pub fn rank(&self) -> Rank {
        self.partition.rank
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Generations completed so far
    pub fn generation(&self) -> Tag {
        self.generation
    }

    pub fn current(&self) -> &LocalBuffer {
        self.buffers.current()
    }

    pub fn owned_cells(&self) -> Vec<Cell> {
        self.buffers.current().interior()
    }

    /// Bring the current buffer's halo up to date with this generation
    pub async fn exchange_halo(&mut self) -> Result<ExchangeStats> {
        let stats = self
            .halo
            .exchange(&mut self.transport, self.buffers.current_mut(), self.generation)
            .await?;
        self.messages_sent += stats.sent;
        self.messages_received += stats.received;
        tracing::debug!(
            rank = self.partition.rank,
            generation = self.generation,
            sent = stats.sent,
            received = stats.received,
            local_copies = stats.local_copies,
            "halo exchange complete"
        );
        Ok(stats)
    }

    pub async fn step(&mut self) -> Result<()> {
        self.exchange_halo().await?;
        let on_multi_thread = tokio::runtime::Handle::try_current()
            .is_ok_and(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread);
        if on_multi_thread && self.engine.is_parallel(&self.buffers) {
            // Hand this runtime thread's other tasks off while rayon holds it
            let (engine, buffers) = (&self.engine, &mut self.buffers);
            tokio::task::block_in_place(|| engine.step(buffers));
        } else {
            self.engine.step(&mut self.buffers);
        }
        tracing::trace!(
            rank = self.partition.rank,
            generation = self.generation,
            "generation finished"
        );
        self.generation += 1;
        Ok(())
    }

    pub async fn run(mut self, iterations: u64) -> Result<WorkerReport> {
        for _ in 0..iterations {
            self.step().await?;
        }
        self.halo.flush(&mut self.transport).await?;

        Ok(WorkerReport {
            rank: self.partition.rank,
            partition: self.partition,
            generations: self.generation,
            messages_sent: self.messages_sent,
            messages_received: self.messages_received,
            cells: self.owned_cells(),
        })
    }
}
