//! Builder configuration
//!
//! Loaded from TOML, e.g. `cobcfg.toml`:
//!
//! ```toml
//! mode = "extended"      # graft cloned PERFORM ranges at each call site
//! evaluate = "direct"    # or "cascade"
//! search = "cascade"     # or "direct"
//! max_graft_depth = 4
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// How out-of-line PERFORM call sites appear in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    /// Call sites keep a group of relocated blocks
    #[default]
    Normal,
    /// Each group is additionally cloned and spliced in at its call site
    Extended,
}

/// Lowering of a multi-way decision (EVALUATE, SEARCH)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lowering {
    /// Chain of nested binary decisions, one per WHEN
    #[default]
    Cascade,
    /// One block forking into every WHEN at once
    Direct,
}

/// Builder options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgConfig {
    #[serde(default)]
    pub mode: BuildMode,

    #[serde(default)]
    pub evaluate: Lowering,

    #[serde(default)]
    pub search: Lowering,

    /// Nesting limit when grafting groups inside grafted groups
    #[serde(default = "default_max_graft_depth")]
    pub max_graft_depth: usize,
}

fn default_max_graft_depth() -> usize {
    8
}

impl Default for CfgConfig {
    fn default() -> Self {
        Self {
            mode: BuildMode::Normal,
            evaluate: Lowering::Cascade,
            search: Lowering::Cascade,
            max_graft_depth: default_max_graft_depth(),
        }
    }
}

impl CfgConfig {
    /// Extended mode with default lowering
    pub fn extended() -> Self {
        Self {
            mode: BuildMode::Extended,
            ..Self::default()
        }
    }

    pub fn is_extended(&self) -> bool {
        self.mode == BuildMode::Extended
    }

    pub fn evaluate_cascade(&self) -> bool {
        self.evaluate == Lowering::Cascade
    }

    pub fn search_cascade(&self) -> bool {
        self.search == Lowering::Cascade
    }

    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CfgConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_extended() && self.max_graft_depth == 0 {
            return Err(ConfigError::ValidationError(
                "max_graft_depth must be at least 1 in extended mode".to_string(),
            ));
        }
        Ok(())
    }
}
