//! Machine configuration.
//!
//! A machine is described by a small TOML document:
//!
//! ```toml
//! board = "ddragon"
//! interleave = 8
//! flip_screen_dip = false
//!
//! [dip]
//! dsw0 = 0xff
//! dsw1 = 0xff
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on CPU slices per scanline.
pub const MAX_INTERLEAVE: u32 = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read machine config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid machine config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown board `{0}`")]
    UnknownBoard(String),
    #[error("interleave {0} out of range (1..={MAX_INTERLEAVE})")]
    InvalidInterleave(u32),
}

/// DIP switch banks, raw and active low.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DipConfig {
    pub dsw0: u8,
    pub dsw1: u8,
}

impl Default for DipConfig {
    fn default() -> Self {
        Self {
            dsw0: 0xFF,
            dsw1: 0xFF,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    pub board: String,
    #[serde(default = "default_interleave")]
    pub interleave: u32,
    #[serde(default)]
    pub flip_screen_dip: bool,
    #[serde(default)]
    pub dip: DipConfig,
}

fn default_interleave() -> u32 {
    1
}

impl MachineConfig {
    /// Defaults for `board`.
    pub fn for_board(board: &str) -> Self {
        Self {
            board: board.to_string(),
            interleave: default_interleave(),
            flip_screen_dip: false,
            dip: DipConfig::default(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: MachineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_INTERLEAVE).contains(&self.interleave) {
            return Err(ConfigError::InvalidInterleave(self.interleave));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_uses_defaults() {
        let config = MachineConfig::from_toml_str("board = \"rtype2\"").unwrap();
        assert_eq!(config, MachineConfig::for_board("rtype2"));
    }

    #[test]
    fn zero_interleave_is_rejected() {
        let err = MachineConfig::from_toml_str("board = \"m72\"\ninterleave = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInterleave(0)));
    }
}
