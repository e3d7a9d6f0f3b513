pub mod config;
pub mod error;
pub mod types;

pub use config::EngineConfig;
pub use error::{LifeError, Result};
pub use types::{Cell, Rank, Tag, COORDINATOR_RANK};
