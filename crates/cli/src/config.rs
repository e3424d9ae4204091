//! Configuration file handling.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tally_analytics::{AnalyticsConfig, PointsPolicy};
use tally_lifecycle::ControllerConfig;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tally.json";

/// Settings for the `tally` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    /// Root of the JSON store
    pub data_dir: PathBuf,

    /// Point crediting policy for reports
    pub points_policy: PointsPolicy,

    /// Stale-write retries per lifecycle operation
    pub stale_retries: usize,

    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".tally"),
            points_policy: PointsPolicy::default(),
            stale_retries: ControllerConfig::default().stale_retries,
            log_level: "info".to_string(),
        }
    }
}

impl TallyConfig {
    /// Load from `path`, or from `tally.json` if present, or fall back to
    /// defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Lifecycle controller settings.
    pub fn controller(&self) -> ControllerConfig {
        ControllerConfig {
            stale_retries: self.stale_retries,
        }
    }

    /// Aggregator settings.
    pub fn analytics(&self) -> AnalyticsConfig {
        AnalyticsConfig {
            points_policy: self.points_policy,
        }
    }
}
