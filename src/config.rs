//! Machine configuration.
//!
//! Only three knobs are recognised: RAM capacity, stack depth and a
//! verbosity flag. They are consumed once, when a [`Cpu`](crate::Cpu) is
//! constructed.

use serde::{Serialize, Deserialize};
use std::path::Path;
use thiserror::Error;

/// Default RAM capacity in bytes.
pub const DEFAULT_RAM_SIZE: usize = 4096;

/// Default number of return addresses the stack can hold.
pub const DEFAULT_STACK_DEPTH: usize = 16;

/// Largest RAM the 16-bit program counter can address.
pub const MAX_RAM_SIZE: usize = 0x1_0000;

/// Configuration for a CHIP-8 machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// RAM capacity in bytes (including the reserved 0x000-0x1FF region).
    pub ram_size: usize,
    /// Stack depth in entries.
    pub stack_depth: usize,
    /// Emit more diagnostics.
    pub verbose: bool,
}

impl MachineConfig {
    /// Check that the machine described by this config can actually be built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ram_size <= crate::cpu::memory::PROGRAM_START || self.ram_size > MAX_RAM_SIZE {
            return Err(ConfigError::RamSize(self.ram_size));
        }
        if self.stack_depth == 0 {
            return Err(ConfigError::StackDepth);
        }
        Ok(())
    }

    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: MachineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config from disk.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Bytes available to a program loaded at 0x200.
    pub fn program_capacity(&self) -> usize {
        self.ram_size.saturating_sub(crate::cpu::memory::PROGRAM_START)
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            ram_size: DEFAULT_RAM_SIZE,
            stack_depth: DEFAULT_STACK_DEPTH,
            verbose: false,
        }
    }
}

/// Errors raised while building or loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("RAM size {0} must be greater than 512 and at most 65536 bytes")]
    RamSize(usize),

    #[error("stack depth must be at least 1")]
    StackDepth,

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
