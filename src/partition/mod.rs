//! Domain decomposition of the toroidal grid into per-worker partitions
//!
//! Ownership is a pure function of the decomposition, so every worker
//! computes the same owner for a cell without talking to anyone.

pub mod decomposition;

pub use decomposition::{Decomposition, Partition};
