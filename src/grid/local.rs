//! Halo-padded per-worker buffers
//!
//! Local coordinates are offset by one: `(0, 0)` is the top-left halo corner
//! and the owned interior spans `1..=owned_height` × `1..=owned_width`.

use crate::core::error::{LifeError, Result};
use crate::core::types::Cell;

/// Row-major `(owned_height + 2) × (owned_width + 2)` cell buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBuffer {
    height: usize,
    width: usize,
    cells: Vec<Cell>,
}

impl LocalBuffer {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            cells: vec![Cell::Dead; height * width],
        }
    }

    /// Wrap an existing row-major payload, checking its length once
    pub fn from_cells(height: usize, width: usize, cells: Vec<Cell>) -> Result<Self> {
        if height < 3 || width < 3 {
            return Err(LifeError::Config(format!(
                "padded buffer must be at least 3x3, got {height}x{width}"
            )));
        }
        if cells.len() != height * width {
            return Err(LifeError::Config(format!(
                "padded sub-grid has {} cells, expected {height}x{width} = {}",
                cells.len(),
                height * width
            )));
        }
        Ok(Self {
            height,
            width,
            cells,
        })
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.height && col < self.width);
        row * self.width + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Cell {
        self.cells[self.index(row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: Cell) {
        let index = self.index(row, col);
        self.cells[index] = value;
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    /// The owned interior, row-major, without the halo
    pub fn interior(&self) -> Vec<Cell> {
        self.cells
            .chunks(self.width)
            .skip(1)
            .take(self.height - 2)
            .flat_map(|row| row[1..self.width - 1].iter().copied())
            .collect()
    }
}

/// Current/next pair swapped by index after each generation
#[derive(Debug, Clone)]
pub struct DoubleBuffer {
    buffers: [LocalBuffer; 2],
    current: usize,
}

impl DoubleBuffer {
    /// Start from a populated buffer; the next buffer begins all dead
    pub fn new(initial: LocalBuffer) -> Self {
        let next = LocalBuffer::new(initial.height(), initial.width());
        Self {
            buffers: [initial, next],
            current: 0,
        }
    }

    pub fn current(&self) -> &LocalBuffer {
        &self.buffers[self.current]
    }

    pub fn current_mut(&mut self) -> &mut LocalBuffer {
        &mut self.buffers[self.current]
    }

    pub fn next_mut(&mut self) -> &mut LocalBuffer {
        &mut self.buffers[1 - self.current]
    }

    /// Borrow current for reading and next for writing at the same time
    pub fn split(&mut self) -> (&LocalBuffer, &mut LocalBuffer) {
        let (first, second) = self.buffers.split_at_mut(1);
        if self.current == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        }
    }

    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cells_checks_length() {
        assert!(LocalBuffer::from_cells(3, 3, vec![Cell::Dead; 9]).is_ok());
        assert!(matches!(
            LocalBuffer::from_cells(3, 3, vec![Cell::Dead; 8]),
            Err(LifeError::Config(_))
        ));
        assert!(LocalBuffer::from_cells(2, 5, vec![Cell::Dead; 10]).is_err());
    }

    #[test]
    fn test_interior_strips_halo() {
        let mut buffer = LocalBuffer::new(4, 5);
        buffer.set(1, 1, Cell::Alive);
        buffer.set(2, 3, Cell::Alive);
        buffer.set(0, 0, Cell::Alive);
        let interior = buffer.interior();
        assert_eq!(interior.len(), 6);
        assert_eq!(interior[0], Cell::Alive);
        assert_eq!(interior[5], Cell::Alive);
        assert_eq!(interior.iter().filter(|c| c.is_alive()).count(), 2);
    }

    #[test]
    fn test_swap_does_not_alias() {
        let mut initial = LocalBuffer::new(3, 3);
        initial.set(1, 1, Cell::Alive);
        let mut buffers = DoubleBuffer::new(initial);

        buffers.next_mut().set(1, 1, Cell::Dead);
        buffers.next_mut().set(0, 2, Cell::Alive);
        buffers.swap();
        assert_eq!(buffers.current().get(0, 2), Cell::Alive);

        buffers.next_mut().set(0, 2, Cell::Dead);
        buffers.next_mut().set(2, 2, Cell::Alive);
        assert_eq!(buffers.current().get(0, 2), Cell::Alive);
        assert_eq!(buffers.current().get(2, 2), Cell::Dead);
        assert_eq!(buffers.next_mut().get(1, 1), Cell::Alive);
    }

    #[test]
    fn test_split_follows_current() {
        let mut initial = LocalBuffer::new(3, 3);
        initial.set(1, 1, Cell::Alive);
        let mut buffers = DoubleBuffer::new(initial);
        buffers.swap();
        let (current, next) = buffers.split();
        assert_eq!(current.get(1, 1), Cell::Dead);
        assert_eq!(next.get(1, 1), Cell::Alive);
    }
}
