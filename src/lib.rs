//! Halo Life - domain-decomposed toroidal Game of Life
//!
//! Each worker owns one rectangle of the grid and refreshes the one-cell
//! halo around it from its neighbors every generation, by message passing
//! only.

pub mod comm;
pub mod coordinator;
pub mod core;
pub mod grid;
pub mod partition;
pub mod simulation;
