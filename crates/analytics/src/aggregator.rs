//! Analytics service.

use std::sync::Arc;

use async_trait::async_trait;
use tally_storage::{Snapshot, Storage, StorageError};
use tracing::debug;

use crate::compute;
use crate::config::AnalyticsConfig;
use crate::report::{
    CategoryReport, CompletionTimesReport, Leaderboard, OverallProgress, ProjectReport, UserReport,
};

/// Result type for analytics queries.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Errors that can occur while computing a report.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// The snapshot could not be read
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Read-only reporting over the entity store.
#[async_trait]
pub trait Analytics: Send + Sync {
    /// Project and problem counts by status, and total points earned.
    async fn overall_progress(&self) -> Result<OverallProgress>;

    /// Completions, points and durations per category.
    async fn by_category(&self) -> Result<CategoryReport>;

    /// Claims, completions and points per user.
    async fn by_user(&self) -> Result<UserReport>;

    /// Status, membership and completion ratio per project.
    async fn by_project(&self) -> Result<ProjectReport>;

    /// Users ranked by points earned.
    async fn leaderboard(&self) -> Result<Leaderboard>;

    /// Creation-to-completion time of every completed problem.
    async fn completion_times(&self) -> Result<CompletionTimesReport>;
}

/// Aggregator that recomputes every report from a fresh snapshot.
pub struct Aggregator<S: Storage> {
    storage: Arc<S>,
    config: AnalyticsConfig,
}

impl<S: Storage> Aggregator<S> {
    /// Create an aggregator over a shared store.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            config: AnalyticsConfig::default(),
        }
    }

    /// Set configuration.
    pub fn with_config(mut self, config: AnalyticsConfig) -> Self {
        self.config = config;
        self
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let snapshot = self.storage.snapshot().await?;
        debug!(
            revision = snapshot.revision,
            problems = snapshot.problems.len(),
            projects = snapshot.projects.len(),
            "snapshot taken"
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl<S: Storage + 'static> Analytics for Aggregator<S> {
    async fn overall_progress(&self) -> Result<OverallProgress> {
        let snapshot = self.snapshot().await?;
        Ok(compute::overall_progress(&snapshot, &self.config))
    }

    async fn by_category(&self) -> Result<CategoryReport> {
        let snapshot = self.snapshot().await?;
        Ok(compute::by_category(&snapshot, &self.config))
    }

    async fn by_user(&self) -> Result<UserReport> {
        let snapshot = self.snapshot().await?;
        Ok(compute::by_user(&snapshot, &self.config))
    }

    async fn by_project(&self) -> Result<ProjectReport> {
        let snapshot = self.snapshot().await?;
        Ok(compute::by_project(&snapshot, &self.config))
    }

    async fn leaderboard(&self) -> Result<Leaderboard> {
        let snapshot = self.snapshot().await?;
        Ok(compute::leaderboard(&snapshot, &self.config))
    }

    async fn completion_times(&self) -> Result<CompletionTimesReport> {
        let snapshot = self.snapshot().await?;
        Ok(compute::completion_times(&snapshot, &self.config))
    }
}
