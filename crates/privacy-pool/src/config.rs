//! pool configuration

use pool_merkle::{DEFAULT_MAX_DEPTH, MAX_SUPPORTED_DEPTH};
use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// depth the circuit is compiled for, merkle paths are padded to it
    pub max_depth: usize,
    /// cipher records per chain fetch
    pub batch_size: u64,
    /// skip commitments whose null root is already on chain
    pub ignore_nullified: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            batch_size: 256,
            ignore_nullified: true,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 || self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(PoolError::InvalidConfig(format!(
                "max_depth must be in 1..={MAX_SUPPORTED_DEPTH}, got {}",
                self.max_depth
            )));
        }
        if self.batch_size == 0 {
            return Err(PoolError::InvalidConfig("batch_size must be non-zero".into()));
        }
        Ok(())
    }
}
