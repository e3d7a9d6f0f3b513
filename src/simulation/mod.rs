//! Worker-side simulation: halo exchange, cell update, and the loop tying them together

pub mod halo;
pub mod update;
pub mod worker;

pub use halo::{ExchangeStats, HaloExchange, HaloPlan};
pub use update::UpdateEngine;
pub use worker::{Worker, WorkerReport};
