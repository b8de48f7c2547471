//! Run configuration loaded from TOML.
//!
//! ```toml
//! cache_dir = "data"
//! offline = false
//! synthetic = false
//!
//! [thresholds]
//! extreme = 10.0
//! elevated = 30.0
//!
//! [[indices]]
//! symbol = "^GSPC"
//! name = "S&P 500"
//! start_date = "1955-01-01"
//! ```
//!
//! Every key is optional; omitted keys fall back to the defaults below.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ddlab_core::analysis::AlertThresholds;
use ddlab_core::data::{IndexSpec, IndexUniverse};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything needed to analyze a set of indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Root of the Parquet price cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Never make network requests; only cached data is used.
    #[serde(default)]
    pub offline: bool,

    /// Fall back to a synthetic random walk when real data is unavailable.
    #[serde(default)]
    pub synthetic: bool,

    /// Re-download even when the cache covers the requested range.
    #[serde(default)]
    pub force: bool,

    #[serde(default)]
    pub thresholds: AlertThresholds,

    #[serde(default = "default_indices")]
    pub indices: Vec<IndexSpec>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_indices() -> Vec<IndexSpec> {
    IndexUniverse::default_indices().indices
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            offline: false,
            synthetic: false,
            force: false,
            thresholds: AlertThresholds::default(),
            indices: default_indices(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.indices.is_empty() {
            return Err(ConfigError::Invalid("at least one index is required".into()));
        }

        let t = &self.thresholds;
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(t.extreme) || !in_range(t.elevated) || t.extreme > t.elevated {
            return Err(ConfigError::Invalid(format!(
                "thresholds must satisfy 0 <= extreme ({}) <= elevated ({}) <= 100",
                t.extreme, t.elevated
            )));
        }

        if self.offline && self.force {
            return Err(ConfigError::Invalid(
                "offline and force are mutually exclusive".into(),
            ));
        }

        let mut seen = HashSet::new();
        for index in &self.indices {
            if index.symbol.trim().is_empty() {
                return Err(ConfigError::Invalid("index symbol must not be empty".into()));
            }
            if !seen.insert(index.symbol.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate index symbol '{}'",
                    index.symbol
                )));
            }
        }

        Ok(())
    }
}
