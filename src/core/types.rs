//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Worker identity. Workers are numbered from 1; rank 0 is the coordinator.
pub type Rank = usize;

/// Message tag. The halo exchange tags every message with its generation.
pub type Tag = u64;

pub const COORDINATOR_RANK: Rank = 0;

/// State of a single grid cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Dead,
    Alive,
}

impl Cell {
    pub const ALIVE_SYMBOL: char = 'X';
    pub const DEAD_SYMBOL: char = '.';

    #[inline]
    pub fn is_alive(self) -> bool {
        matches!(self, Cell::Alive)
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            Self::ALIVE_SYMBOL => Some(Cell::Alive),
            Self::DEAD_SYMBOL => Some(Cell::Dead),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Cell::Alive => Self::ALIVE_SYMBOL,
            Cell::Dead => Self::DEAD_SYMBOL,
        }
    }
}

impl From<bool> for Cell {
    fn from(alive: bool) -> Self {
        if alive {
            Cell::Alive
        } else {
            Cell::Dead
        }
    }
}
