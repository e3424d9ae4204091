//! Analytics configuration.

use serde::{Deserialize, Serialize};

/// Which point value a completed problem is credited with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointsPolicy {
    /// The category's current value; edits apply retroactively
    #[default]
    Current,
    /// The value captured when the problem was completed
    Frozen,
}

impl std::str::FromStr for PointsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "current" => Ok(Self::Current),
            "frozen" => Ok(Self::Frozen),
            other => Err(format!("unknown points policy '{}'", other)),
        }
    }
}

/// Aggregator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Point crediting policy
    pub points_policy: PointsPolicy,
}
