//! Configuration management.
//!
//! Everything has a default, so a missing file is the same as an empty one.
//! The priority tables can be overridden per scheme:
//!
//! ```toml
//! data_root = "data"
//!
//! [resolver.pmid]
//! priority = [{ collection = 35, rank = 1 }]
//! excluded_types = [40]
//!
//! [matcher]
//! preferences = [{ external_type = "journal article", collection = 35, rank = 0 }]
//! ```

mod defaults;

pub use defaults::*;

use crate::dedupe::ResolverConfig;
use crate::meta::MatcherConfig;
use crate::{ReconcileError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding every dataset the pipeline writes
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,

    /// Identifier conflict resolution among repository records
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Conflict resolution among matched Meta records
    #[serde(default)]
    pub matcher: MatcherConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            resolver: ResolverConfig::default(),
            matcher: MatcherConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from `path`, or the defaults when no path is
    /// given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("No config file given, using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            return Err(ReconcileError::NotFound {
                path: path.to_path_buf(),
                hint: "Check the --config argument.".to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
