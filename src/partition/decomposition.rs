//! Chunk layout, partition bounds, and the rank-for-cell lookup

use crate::core::error::{LifeError, Result};
use crate::core::types::Rank;
use serde::{Deserialize, Serialize};

/// Split of an N×N torus into `width_chunks × height_chunks` rectangles
///
/// Chunk sizes are `ceil(N / chunks)`, so the last row or column of chunks
/// may be smaller than the others. Combinations where the clipping would
/// leave a trailing chunk empty are rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decomposition {
    grid_size: usize,
    width_chunks: usize,
    height_chunks: usize,
    chunk_width: usize,
    chunk_height: usize,
}

/// A worker's exclusively owned rectangle, half-open in global coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub rank: Rank,
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl Partition {
    #[inline]
    pub fn owned_height(&self) -> usize {
        self.row_end - self.row_start
    }

    #[inline]
    pub fn owned_width(&self) -> usize {
        self.col_end - self.col_start
    }

    /// Height of the local buffer including the one-cell halo
    #[inline]
    pub fn padded_height(&self) -> usize {
        self.owned_height() + 2
    }

    /// Width of the local buffer including the one-cell halo
    #[inline]
    pub fn padded_width(&self) -> usize {
        self.owned_width() + 2
    }

    pub fn owned_cells(&self) -> usize {
        self.owned_height() * self.owned_width()
    }

    /// Whether a normalized global cell lies inside this partition
    #[inline]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.row_start..self.row_end).contains(&row)
            && (self.col_start..self.col_end).contains(&col)
    }

    /// Local buffer position of an unnormalized global coordinate
    ///
    /// Coordinates one step outside the owned bounds map onto the halo
    /// ring; anything further out has no local position.
    pub fn to_local(&self, row: isize, col: isize) -> Option<(usize, usize)> {
        let local_row = row - self.row_start as isize + 1;
        let local_col = col - self.col_start as isize + 1;
        if local_row < 0
            || local_col < 0
            || local_row >= self.padded_height() as isize
            || local_col >= self.padded_width() as isize
        {
            return None;
        }
        Some((local_row as usize, local_col as usize))
    }
}

fn ceil_div(n: usize, d: usize) -> usize {
    (n + d - 1) / d
}

fn integer_sqrt(n: usize) -> usize {
    let mut root = 0usize;
    while (root + 1) * (root + 1) <= n {
        root += 1;
    }
    root
}

impl Decomposition {
    pub fn new(grid_size: usize, width_chunks: usize, height_chunks: usize) -> Result<Self> {
        if grid_size == 0 {
            return Err(LifeError::Config("grid size must be positive".into()));
        }
        if width_chunks == 0 || height_chunks == 0 {
            return Err(LifeError::Config(format!(
                "decomposition factors must be positive, got {width_chunks}x{height_chunks}"
            )));
        }

        let chunk_width = ceil_div(grid_size, width_chunks);
        let chunk_height = ceil_div(grid_size, height_chunks);

        // With ceiling chunk sizes the only possible gap is an empty trailing chunk.
        if (width_chunks - 1) * chunk_width >= grid_size {
            return Err(LifeError::Config(format!(
                "{width_chunks} column chunks of width {chunk_width} leave an empty \
                 partition on a grid of size {grid_size}"
            )));
        }
        if (height_chunks - 1) * chunk_height >= grid_size {
            return Err(LifeError::Config(format!(
                "{height_chunks} row chunks of height {chunk_height} leave an empty \
                 partition on a grid of size {grid_size}"
            )));
        }

        Ok(Self {
            grid_size,
            width_chunks,
            height_chunks,
            chunk_width,
            chunk_height,
        })
    }

    /// Factors derived from the number of worker processes
    ///
    /// `width_chunks = floor(sqrt(P))`, `height_chunks = floor(P / width_chunks)`.
    pub fn for_workers(grid_size: usize, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(LifeError::Config("at least one worker is required".into()));
        }
        let width_chunks = integer_sqrt(workers);
        let height_chunks = workers / width_chunks;
        Self::new(grid_size, width_chunks, height_chunks)
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn width_chunks(&self) -> usize {
        self.width_chunks
    }

    pub fn height_chunks(&self) -> usize {
        self.height_chunks
    }

    /// Number of ranks that own a partition
    pub fn worker_count(&self) -> usize {
        self.width_chunks * self.height_chunks
    }

    pub fn is_assigned(&self, rank: Rank) -> bool {
        (1..=self.worker_count()).contains(&rank)
    }

    /// Wrap a coordinate onto the torus
    #[inline]
    pub fn normalize(&self, row: isize, col: isize) -> (usize, usize) {
        let n = self.grid_size as isize;
        (row.rem_euclid(n) as usize, col.rem_euclid(n) as usize)
    }

    /// Rank that owns a cell, after toroidal wraparound
    #[inline]
    pub fn owner_of(&self, row: isize, col: isize) -> Rank {
        let (row, col) = self.normalize(row, col);
        let width_pos = col / self.chunk_width;
        let height_pos = row / self.chunk_height;
        height_pos * self.width_chunks + width_pos + 1
    }

    pub fn partition(&self, rank: Rank) -> Result<Partition> {
        if !self.is_assigned(rank) {
            return Err(LifeError::UnknownRank(rank));
        }
        let width_pos = (rank - 1) % self.width_chunks;
        let height_pos = (rank - 1) / self.width_chunks;

        let row_start = height_pos * self.chunk_height;
        let col_start = width_pos * self.chunk_width;
        Ok(Partition {
            rank,
            row_start,
            row_end: (row_start + self.chunk_height).min(self.grid_size),
            col_start,
            col_end: (col_start + self.chunk_width).min(self.grid_size),
        })
    }

    pub fn partitions(&self) -> impl Iterator<Item = Partition> + '_ {
        (1..=self.worker_count()).filter_map(move |rank| self.partition(rank).ok())
    }

    /// Check cell by cell that the partitions tile the grid and agree with `owner_of`
    pub fn verify(&self) -> Result<()> {
        // Each owned cell maps back to its own partition, so no cell is
        // claimed twice; the areas then account for the whole grid.
        for partition in self.partitions() {
            for row in partition.row_start..partition.row_end {
                for col in partition.col_start..partition.col_end {
                    let owner = self.owner_of(row as isize, col as isize);
                    if owner != partition.rank {
                        return Err(LifeError::Config(format!(
                            "cell ({row}, {col}) lies in partition {} but maps to rank {owner}",
                            partition.rank
                        )));
                    }
                }
            }
        }

        let covered: usize = self.partitions().map(|p| p.owned_cells()).sum();
        let total = self.grid_size * self.grid_size;
        if covered != total {
            return Err(LifeError::Config(format!(
                "partitions cover {covered} of {total} cells"
            )));
        }
        Ok(())
    }
}
