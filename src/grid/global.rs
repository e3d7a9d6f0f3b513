//! The full N×N grid as seen by the coordinator
//!
//! Text format: N lines of N symbols, `X` alive and `.` dead.

use crate::core::error::{LifeError, Result};
use crate::core::types::Cell;
use crate::partition::Partition;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalGrid {
    size: usize,
    cells: Vec<Cell>,
}

impl GlobalGrid {
    /// Largest accepted side length; a grid this size holds 2^30 cells
    pub const MAX_SIZE: usize = 1 << 15;

    /// Reject side lengths that are zero or too large to allocate
    pub fn check_size(size: usize) -> Result<()> {
        if size == 0 {
            return Err(LifeError::Config("grid size must be positive".into()));
        }
        match size.checked_mul(size) {
            Some(_) if size <= Self::MAX_SIZE => Ok(()),
            _ => Err(LifeError::Config(format!(
                "grid size {size} exceeds the maximum of {}",
                Self::MAX_SIZE
            ))),
        }
    }

    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![Cell::Dead; size * size],
        }
    }

    /// Build a grid with the listed `(row, col)` cells alive
    pub fn with_alive(size: usize, alive: &[(usize, usize)]) -> Self {
        let mut grid = Self::new(size);
        for &(row, col) in alive {
            grid.set(row % size, col % size, Cell::Alive);
        }
        grid
    }

    /// Seeded random grid where each cell is alive with probability `density`
    pub fn random(size: usize, density: f64, seed: u64) -> Result<Self> {
        Self::check_size(size)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let density = density.clamp(0.0, 1.0);
        let cells = (0..size * size)
            .map(|_| Cell::from(rng.gen_bool(density)))
            .collect();
        Ok(Self { size, cells })
    }

    /// Parse exactly `size` lines of `size` symbols
    ///
    /// Trailing blank lines are ignored.
    pub fn parse(text: &str, size: usize) -> Result<Self> {
        Self::check_size(size)?;
        let lines: Vec<&str> = text.trim_end().lines().map(str::trim_end).collect();
        if lines.len() != size {
            return Err(LifeError::GridParse {
                line: lines.len().min(size) + 1,
                reason: format!("expected {size} rows, found {}", lines.len()),
            });
        }

        let mut cells = Vec::with_capacity(size * size);
        for (index, line) in lines.iter().enumerate() {
            let before = cells.len();
            for symbol in line.chars() {
                let cell = Cell::from_symbol(symbol).ok_or_else(|| LifeError::GridParse {
                    line: index + 1,
                    reason: format!("unexpected symbol {symbol:?}"),
                })?;
                cells.push(cell);
            }
            let width = cells.len() - before;
            if width != size {
                return Err(LifeError::GridParse {
                    line: index + 1,
                    reason: format!("expected {size} columns, found {width}"),
                });
            }
        }
        Ok(Self { size, cells })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Cell {
        self.cells[row * self.size + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: Cell) {
        self.cells[row * self.size + col] = value;
    }

    /// Read with toroidal wraparound
    pub fn get_wrapped(&self, row: isize, col: isize) -> Cell {
        let n = self.size as isize;
        self.get(row.rem_euclid(n) as usize, col.rem_euclid(n) as usize)
    }

    pub fn alive_cells(&self) -> Vec<(usize, usize)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_alive())
            .map(|(index, _)| (index / self.size, index % self.size))
            .collect()
    }

    pub fn population(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_alive()).count()
    }

    /// The scatter payload for one worker: its region plus a wrapped halo ring
    pub fn padded_subgrid(&self, partition: &Partition) -> Vec<Cell> {
        let rows = partition.row_start as isize - 1..partition.row_end as isize + 1;
        let cols = partition.col_start as isize - 1..partition.col_end as isize + 1;
        rows.flat_map(|row| cols.clone().map(move |col| (row, col)))
            .map(|(row, col)| self.get_wrapped(row, col))
            .collect()
    }

    /// Write a worker's owned region back (the gather step)
    pub fn insert_region(&mut self, partition: &Partition, cells: &[Cell]) -> Result<()> {
        if cells.len() != partition.owned_cells() {
            return Err(LifeError::Protocol(format!(
                "rank {} returned {} cells for a {}x{} region",
                partition.rank,
                cells.len(),
                partition.owned_height(),
                partition.owned_width()
            )));
        }
        let width = partition.owned_width();
        for (offset, row_cells) in cells.chunks(width).enumerate() {
            let start = (partition.row_start + offset) * self.size + partition.col_start;
            self.cells[start..start + width].copy_from_slice(row_cells);
        }
        Ok(())
    }
}

impl fmt::Display for GlobalGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.size) {
            let line: String = row.iter().map(|cell| cell.symbol()).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
