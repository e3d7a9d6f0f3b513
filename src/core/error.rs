use crate::core::types::{Rank, Tag};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LifeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Grid parse error at line {line}: {reason}")]
    GridParse { line: usize, reason: String },

    #[error("Rank {0} is not assigned a partition")]
    UnknownRank(Rank),

    #[error("Communication failure: {0}")]
    Communication(String),

    #[error("Rank {rank} timed out waiting for rank {peer} (tag {tag})")]
    Timeout { rank: Rank, peer: Rank, tag: Tag },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, LifeError>;
