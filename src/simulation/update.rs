//! Generation update over a worker's owned cells
//!
//! Reads only the current buffer and writes only interior slots of the next
//! buffer, so rows can be computed on any thread in any order.
//!
//! Uses rayon for partitions at or above the configured size.

use crate::core::types::Cell;
use crate::grid::{DoubleBuffer, LocalBuffer};
use crate::simulation::halo::NEIGHBOR_OFFSETS;
use rayon::prelude::*;

/// Survival on 2 or 3 live neighbors, birth on exactly 3
#[inline]
pub fn next_state(current: Cell, alive_neighbors: u8) -> Cell {
    match (current, alive_neighbors) {
        (Cell::Alive, 2) | (_, 3) => Cell::Alive,
        _ => Cell::Dead,
    }
}

/// Live neighbors of an interior slot, read from the halo-padded buffer
#[inline]
pub fn alive_neighbors(buffer: &LocalBuffer, row: usize, col: usize) -> u8 {
    NEIGHBOR_OFFSETS
        .iter()
        .filter(|(delta_row, delta_col)| {
            let r = (row as isize + delta_row) as usize;
            let c = (col as isize + delta_col) as usize;
            buffer.get(r, c).is_alive()
        })
        .count() as u8
}

fn update_row(current: &LocalBuffer, row: usize, out: &mut [Cell]) {
    let width = current.width();
    for col in 1..width - 1 {
        out[col] = next_state(current.get(row, col), alive_neighbors(current, row, col));
    }
}

/// Write the next generation of every owned cell of `current` into `next`
///
/// Halo slots of `next` are left untouched; the following exchange
/// overwrites them.
pub fn advance(current: &LocalBuffer, next: &mut LocalBuffer, parallel: bool) {
    debug_assert_eq!(
        (current.height(), current.width()),
        (next.height(), next.width())
    );
    let height = current.height();
    let width = current.width();

    if parallel {
        next.as_mut_slice()
            .par_chunks_mut(width)
            .enumerate()
            .filter(|(row, _)| *row > 0 && *row < height - 1)
            .for_each(|(row, out)| update_row(current, row, out));
    } else {
        let rows = next.as_mut_slice().chunks_mut(width).enumerate();
        for (row, out) in rows.filter(|(row, _)| *row > 0 && *row < height - 1) {
            update_row(current, row, out);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UpdateEngine {
    parallel_threshold: usize,
}

impl UpdateEngine {
    pub fn new(parallel_threshold: usize) -> Self {
        Self { parallel_threshold }
    }

    /// Whether a step over `buffers` fans out to the rayon pool
    pub fn is_parallel(&self, buffers: &DoubleBuffer) -> bool {
        let current = buffers.current();
        (current.height() - 2) * (current.width() - 2) >= self.parallel_threshold
    }

    /// Advance one generation and swap current/next
    pub fn step(&self, buffers: &mut DoubleBuffer) {
        let parallel = self.is_parallel(buffers);
        let (current, next) = buffers.split();
        advance(current, next, parallel);
        buffers.swap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_table() {
        for count in 0..=8u8 {
            let survives = next_state(Cell::Alive, count);
            let born = next_state(Cell::Dead, count);
            assert_eq!(survives.is_alive(), count == 2 || count == 3, "alive with {count}");
            assert_eq!(born.is_alive(), count == 3, "dead with {count}");
        }
    }

    #[test]
    fn test_neighbors_include_halo() {
        let mut buffer = LocalBuffer::new(3, 3);
        buffer.set(0, 0, Cell::Alive);
        buffer.set(2, 2, Cell::Alive);
        buffer.set(1, 2, Cell::Alive);
        buffer.set(1, 1, Cell::Alive);
        assert_eq!(alive_neighbors(&buffer, 1, 1), 3);
    }

    fn blinker_buffer() -> LocalBuffer {
        // 5x5 interior with a horizontal blinker, no live halo cells
        let mut buffer = LocalBuffer::new(7, 7);
        for col in 2..=4 {
            buffer.set(3, col, Cell::Alive);
        }
        buffer
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let current = blinker_buffer();
        let mut sequential = LocalBuffer::new(7, 7);
        let mut parallel = LocalBuffer::new(7, 7);
        advance(&current, &mut sequential, false);
        advance(&current, &mut parallel, true);
        assert_eq!(sequential, parallel);
        let alive: Vec<_> = (0..7)
            .flat_map(|r| (0..7).map(move |c| (r, c)))
            .filter(|&(r, c)| sequential.get(r, c).is_alive())
            .collect();
        assert_eq!(alive, vec![(2, 3), (3, 3), (4, 3)]);
    }

    #[test]
    fn test_halo_of_next_is_untouched() {
        let current = blinker_buffer();
        let mut next = LocalBuffer::new(7, 7);
        next.set(0, 3, Cell::Alive);
        advance(&current, &mut next, false);
        assert_eq!(next.get(0, 3), Cell::Alive);
    }

    #[test]
    fn test_step_swaps_buffers() {
        let mut buffers = DoubleBuffer::new(blinker_buffer());
        let engine = UpdateEngine::new(usize::MAX);
        assert!(!engine.is_parallel(&buffers));
        assert!(UpdateEngine::new(9).is_parallel(&buffers));
        engine.step(&mut buffers);
        assert!(buffers.current().get(2, 3).is_alive());
        assert!(!buffers.current().get(3, 2).is_alive());
        // The old generation is now the next buffer
        assert!(buffers.next_mut().get(3, 2).is_alive());
    }
}
