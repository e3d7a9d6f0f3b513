//! Engine configuration with documented defaults
//!
//! Values can be loaded from a TOML file; any field left out keeps its
//! default. Command line flags override whatever the file says.

use crate::core::error::{LifeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Configuration for a simulation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of worker processes available, excluding the coordinator
    ///
    /// The grid is split into `floor(sqrt(P))` chunks horizontally and
    /// `P / floor(sqrt(P))` chunks vertically. Ranks beyond that product
    /// stay idle.
    pub workers: usize,

    /// How long a worker waits for a single halo receive before aborting
    ///
    /// A neighbor that never sends is a fatal communication failure.
    pub recv_timeout_ms: u64,

    /// Minimum owned-cell count before the update uses rayon
    ///
    /// Small partitions are cheaper to update on the calling thread.
    pub parallel_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            recv_timeout_ms: 10_000,
            parallel_threshold: 4096,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(LifeError::Config("workers must be at least 1".into()));
        }
        if self.recv_timeout_ms == 0 {
            return Err(LifeError::Config(
                "recv_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
