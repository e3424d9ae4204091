//! Analytics (read-only reporting)
//!
//! Completion counts, point totals, durations and status breakdowns
//! derived from a store snapshot, plus the integrity warnings found on the
//! way.

#![warn(missing_docs)]

pub mod config;
pub mod integrity;
pub mod report;
pub mod compute;
pub mod aggregator;

pub use config::{AnalyticsConfig, PointsPolicy};
pub use integrity::{IntegrityWarning, WarningKind};
pub use report::{
    CategoryReport, CategoryStats, CompletionTime, CompletionTimesReport, Leaderboard,
    LeaderboardEntry, OverallProgress, ProjectReport, ProjectStats, UserReport, UserStats,
};
pub use aggregator::{Aggregator, Analytics, AnalyticsError, Result};
