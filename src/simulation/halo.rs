//! Per-generation halo exchange
//!
//! The plan is derived once from the decomposition: which ring slots are
//! copies of the worker's own cells (the torus wrapped back into its own
//! region), which global cells must be received and from whom, and which
//! boundary cells must be sent where. Each generation then posts one receive
//! per distinct remote cell, sends one message per (boundary cell,
//! destination) pair, and waits for the receives before the update runs.

use crate::comm::{CellMessage, Request, Transport};
use crate::core::error::{LifeError, Result};
use crate::core::types::{Rank, Tag};
use crate::grid::LocalBuffer;
use crate::partition::{Decomposition, Partition};
use ahash::AHashMap;

type Slot = (usize, usize);

/// Offsets to the eight neighbors as `(delta_row, delta_col)`
pub const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

#[derive(Debug, Clone)]
struct LocalCopy {
    slot: Slot,
    source: Slot,
}

/// A global cell owned by another rank, and every ring slot that shows it
#[derive(Debug, Clone)]
struct RemoteCell {
    row: usize,
    col: usize,
    owner: Rank,
    slots: Vec<Slot>,
}

/// An owned cell whose value other ranks need in their halo
#[derive(Debug, Clone)]
struct BoundaryCell {
    local: Slot,
    row: usize,
    col: usize,
    destinations: Vec<Rank>,
}

#[derive(Debug, Clone)]
pub struct HaloPlan {
    rank: Rank,
    local_copies: Vec<LocalCopy>,
    remote: Vec<RemoteCell>,
    remote_index: AHashMap<(usize, usize), usize>,
    boundary: Vec<BoundaryCell>,
}

impl HaloPlan {
    pub fn new(decomposition: &Decomposition, partition: &Partition) -> Self {
        let rank = partition.rank;
        let row_start = partition.row_start as isize;
        let row_end = partition.row_end as isize;
        let col_start = partition.col_start as isize;
        let col_end = partition.col_end as isize;

        let mut local_copies = Vec::new();
        let mut remote: Vec<RemoteCell> = Vec::new();
        let mut remote_index = AHashMap::new();

        for row in row_start - 1..=row_end {
            for col in col_start - 1..=col_end {
                let inside =
                    (row_start..row_end).contains(&row) && (col_start..col_end).contains(&col);
                if inside {
                    continue;
                }
                let slot = ((row - row_start + 1) as usize, (col - col_start + 1) as usize);
                let (global_row, global_col) = decomposition.normalize(row, col);
                let owner = decomposition.owner_of(row, col);

                if owner == rank {
                    local_copies.push(LocalCopy {
                        slot,
                        source: (
                            global_row - partition.row_start + 1,
                            global_col - partition.col_start + 1,
                        ),
                    });
                    continue;
                }

                let index = *remote_index.entry((global_row, global_col)).or_insert_with(|| {
                    remote.push(RemoteCell {
                        row: global_row,
                        col: global_col,
                        owner,
                        slots: Vec::new(),
                    });
                    remote.len() - 1
                });
                remote[index].slots.push(slot);
            }
        }

        let mut boundary = Vec::new();
        for row in partition.row_start..partition.row_end {
            for col in partition.col_start..partition.col_end {
                let on_edge = row == partition.row_start
                    || row + 1 == partition.row_end
                    || col == partition.col_start
                    || col + 1 == partition.col_end;
                if !on_edge {
                    continue;
                }

                let mut destinations = Vec::new();
                for (delta_row, delta_col) in NEIGHBOR_OFFSETS {
                    let owner =
                        decomposition.owner_of(row as isize + delta_row, col as isize + delta_col);
                    if owner != rank && !destinations.contains(&owner) {
                        destinations.push(owner);
                    }
                }
                if !destinations.is_empty() {
                    boundary.push(BoundaryCell {
                        local: (row - partition.row_start + 1, col - partition.col_start + 1),
                        row,
                        col,
                        destinations,
                    });
                }
            }
        }

        Self {
            rank,
            local_copies,
            remote,
            remote_index,
            boundary,
        }
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Receives posted per generation
    pub fn receive_count(&self) -> usize {
        self.remote.len()
    }

    /// Messages sent per generation
    pub fn send_count(&self) -> usize {
        self.boundary.iter().map(|cell| cell.destinations.len()).sum()
    }

    pub fn local_copy_count(&self) -> usize {
        self.local_copies.len()
    }

    /// Global cells this rank expects to receive from `source`
    pub fn expected_from(&self, source: Rank) -> Vec<(usize, usize)> {
        self.remote
            .iter()
            .filter(|cell| cell.owner == source)
            .map(|cell| (cell.row, cell.col))
            .collect()
    }

    /// Global cells this rank sends to `destination`
    pub fn sent_to(&self, destination: Rank) -> Vec<(usize, usize)> {
        self.boundary
            .iter()
            .filter(|cell| cell.destinations.contains(&destination))
            .map(|cell| (cell.row, cell.col))
            .collect()
    }

    /// Ranks this worker exchanges messages with
    pub fn neighbors(&self) -> Vec<Rank> {
        let mut ranks: Vec<Rank> = self
            .remote
            .iter()
            .map(|cell| cell.owner)
            .chain(self.boundary.iter().flat_map(|cell| cell.destinations.iter().copied()))
            .collect();
        ranks.sort_unstable();
        ranks.dedup();
        ranks
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeStats {
    pub sent: usize,
    pub received: usize,
    pub local_copies: usize,
}

/// Runs the plan against a transport, generation after generation
#[derive(Debug)]
pub struct HaloExchange {
    plan: HaloPlan,
    outstanding_sends: Vec<Request>,
}

impl HaloExchange {
    pub fn new(plan: HaloPlan) -> Self {
        Self {
            plan,
            outstanding_sends: Vec::new(),
        }
    }

    pub fn plan(&self) -> &HaloPlan {
        &self.plan
    }

    /// Wait for the previous generation's sends
    pub async fn flush<T: Transport>(&mut self, transport: &mut T) -> Result<()> {
        if self.outstanding_sends.is_empty() {
            return Ok(());
        }
        let sends = std::mem::take(&mut self.outstanding_sends);
        transport.wait_all(sends).await?;
        Ok(())
    }

    /// Refresh every halo slot of `buffer` with the values tagged `tag`
    ///
    /// On return the ring matches the owners' current values and `buffer`
    /// is ready for the update. The sends issued here are waited on at the
    /// start of the next exchange or by [`HaloExchange::flush`].
    pub async fn exchange<T: Transport>(
        &mut self,
        transport: &mut T,
        buffer: &mut LocalBuffer,
        tag: Tag,
    ) -> Result<ExchangeStats> {
        self.flush(transport).await?;

        for copy in &self.plan.local_copies {
            let value = buffer.get(copy.source.0, copy.source.1);
            buffer.set(copy.slot.0, copy.slot.1, value);
        }

        let mut receives: Vec<Request> = Vec::with_capacity(self.plan.remote.len());
        for cell in &self.plan.remote {
            receives.push(transport.irecv(cell.owner, tag)?.into());
        }

        for cell in &self.plan.boundary {
            let value = buffer.get(cell.local.0, cell.local.1);
            for &destination in &cell.destinations {
                let message = CellMessage::new(cell.row, cell.col, value);
                self.outstanding_sends
                    .push(transport.isend(destination, tag, message)?.into());
            }
        }
        let sent = self.outstanding_sends.len();

        let messages = transport.wait_all(receives).await?;
        let mut filled = vec![false; self.plan.remote.len()];
        for (position, message) in messages.iter().enumerate() {
            let index = *self
                .plan
                .remote_index
                .get(&(message.row, message.col))
                .ok_or_else(|| {
                    LifeError::Protocol(format!(
                        "rank {} received cell ({}, {}) which is not in its halo",
                        self.plan.rank, message.row, message.col
                    ))
                })?;

            let cell = &self.plan.remote[index];
            let source = self.plan.remote[position].owner;
            if cell.owner != source {
                return Err(LifeError::Protocol(format!(
                    "rank {} received cell ({}, {}) from rank {source}, but rank {} owns it",
                    self.plan.rank, message.row, message.col, cell.owner
                )));
            }
            if std::mem::replace(&mut filled[index], true) {
                return Err(LifeError::Protocol(format!(
                    "rank {} received cell ({}, {}) twice in generation {tag}",
                    self.plan.rank, message.row, message.col
                )));
            }
            for &(row, col) in &cell.slots {
                buffer.set(row, col, message.value);
            }
        }

        Ok(ExchangeStats {
            sent,
            received: messages.len(),
            local_copies: self.plan.local_copies.len(),
        })
    }
}
