//! Configuration types for TIDEMARK

use crate::error::TidemarkError;
use crate::traits::TidemarkResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name for logging
    pub name: String,

    /// Data directory
    pub data_dir: PathBuf,

    /// Logging level, any `EnvFilter` directive
    pub log_level: String,

    /// Checkpoint parameters
    #[serde(default)]
    pub checkpoint: CheckpointParams,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "tidemark-node".to_string(),
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            checkpoint: CheckpointParams::default(),
        }
    }
}

impl NodeConfig {
    pub fn load(path: &Path) -> TidemarkResult<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&data)?;
        config.checkpoint.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> TidemarkResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Checkpoint parameters, read-only scalars shared by every replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointParams {
    /// Header numbers on the root chain advance by this much per checkpoint
    pub child_block_interval: u64,

    /// Seconds a buffered checkpoint waits for its ack
    pub checkpoint_buffer_time: u64,

    /// Root-chain blocks required on top of a header or receipt
    pub confirmation_blocks: u64,

    pub avg_checkpoint_length: u64,

    pub max_checkpoint_length: u64,
}

impl Default for CheckpointParams {
    fn default() -> Self {
        Self {
            child_block_interval: 10_000,
            checkpoint_buffer_time: 1_000,
            confirmation_blocks: 6,
            avg_checkpoint_length: 256,
            max_checkpoint_length: 1_024,
        }
    }
}

impl CheckpointParams {
    pub fn validate(&self) -> TidemarkResult<()> {
        if self.child_block_interval == 0 {
            return Err(TidemarkError::ConfigError(
                "child_block_interval must be positive".to_string(),
            ));
        }
        if self.avg_checkpoint_length > self.max_checkpoint_length {
            return Err(TidemarkError::ConfigError(format!(
                "avg_checkpoint_length {} exceeds max_checkpoint_length {}",
                self.avg_checkpoint_length, self.max_checkpoint_length
            )));
        }
        Ok(())
    }
}
