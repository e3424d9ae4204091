//! Report types returned by the aggregator.
//!
//! All of them are plain data. Metrics with no underlying data are `None`,
//! never zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tally_core::{CategoryId, ProblemId, ProblemStatus, ProjectId, ProjectStatus, Time, UserId};

use crate::integrity::IntegrityWarning;

/// Store-wide status counts and points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallProgress {
    /// Store revision the report was computed at
    pub revision: u64,
    /// Project count per status; every status is present
    pub projects_by_status: BTreeMap<ProjectStatus, usize>,
    /// Project count per planned length in weeks and status; every
    /// length and status is present
    pub projects_by_planned_weeks: BTreeMap<u8, BTreeMap<ProjectStatus, usize>>,
    /// Problem count per status; every status is present
    pub problems_by_status: BTreeMap<ProblemStatus, usize>,
    /// Total number of projects
    pub total_projects: usize,
    /// Total number of problems
    pub total_problems: usize,
    /// Points earned over all completed problems
    pub total_points: u64,
    /// Integrity warnings found in the snapshot
    pub warnings: Vec<IntegrityWarning>,
}

/// Completion metrics for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    /// Category id
    pub category_id: CategoryId,
    /// Category name
    pub name: String,
    /// Current point value
    pub points: u32,
    /// Problems filed under this category
    pub total: usize,
    /// Completed problems in this category
    pub completed: usize,
    /// completed / total; absent when the category has no problems
    pub completion_rate: Option<f64>,
    /// Points credited for those problems
    pub total_points: u64,
    /// Mean claim-to-completion time in seconds
    pub mean_completion_secs: Option<f64>,
    /// Median claim-to-completion time in seconds
    pub median_completion_secs: Option<f64>,
}

/// Per-category report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    /// Store revision the report was computed at
    pub revision: u64,
    /// Stats keyed by category
    pub categories: BTreeMap<CategoryId, CategoryStats>,
    /// Integrity warnings found in the snapshot
    pub warnings: Vec<IntegrityWarning>,
}

impl CategoryReport {
    /// Look up a category's stats by name.
    pub fn by_name(&self, name: &str) -> Option<&CategoryStats> {
        self.categories.values().find(|c| c.name == name)
    }
}

/// Activity metrics for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    /// User id
    pub user_id: UserId,
    /// Display name
    pub name: String,
    /// Problems currently held or completed by the user
    pub claimed: usize,
    /// Problems completed by the user
    pub completed: usize,
    /// Problems held or completed by the user, per status
    pub by_status: BTreeMap<ProblemStatus, usize>,
    /// Points earned
    pub points: u64,
}

/// Per-user report; every user in the store is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserReport {
    /// Store revision the report was computed at
    pub revision: u64,
    /// Stats keyed by user
    pub users: BTreeMap<UserId, UserStats>,
    /// Integrity warnings found in the snapshot
    pub warnings: Vec<IntegrityWarning>,
}

/// Progress metrics for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectStats {
    /// Project id
    pub project_id: ProjectId,
    /// Project name
    pub name: String,
    /// Current status
    pub status: ProjectStatus,
    /// Number of members
    pub member_count: usize,
    /// Problems linked to the project
    pub linked_problems: usize,
    /// Linked problems that are completed
    pub completed_problems: usize,
    /// completed / linked; absent when nothing is linked
    pub completion_ratio: Option<f64>,
    /// Planned length in weeks
    pub planned_weeks: u8,
    /// Creation-to-completion time in seconds
    pub duration_secs: Option<f64>,
    /// Whether the project ran longer than planned; absent until completed
    pub over_planned: Option<bool>,
}

/// Per-project report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectReport {
    /// Store revision the report was computed at
    pub revision: u64,
    /// Stats keyed by project
    pub projects: BTreeMap<ProjectId, ProjectStats>,
    /// Integrity warnings found in the snapshot
    pub warnings: Vec<IntegrityWarning>,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based position
    pub rank: usize,
    /// User id
    pub user_id: UserId,
    /// Display name
    pub name: String,
    /// Points earned
    pub points: u64,
}

/// Users ranked by points earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    /// Store revision the report was computed at
    pub revision: u64,
    /// Rows, best first
    pub entries: Vec<LeaderboardEntry>,
    /// Integrity warnings found in the snapshot
    pub warnings: Vec<IntegrityWarning>,
}

/// Creation-to-completion time of one completed problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionTime {
    /// Problem id
    pub problem_id: ProblemId,
    /// Problem title
    pub title: String,
    /// Category id
    pub category_id: CategoryId,
    /// When the problem was created
    pub created_at: Time,
    /// When the problem was completed
    pub completed_at: Time,
    /// completed_at - created_at in seconds; may be negative on skewed data
    pub lead_secs: f64,
}

/// Creation-to-completion times, most recently completed first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionTimesReport {
    /// Store revision the report was computed at
    pub revision: u64,
    /// One row per completed problem
    pub problems: Vec<CompletionTime>,
    /// Mean lead time in seconds over non-negative spans
    pub mean_lead_secs: Option<f64>,
    /// Median lead time in seconds over non-negative spans
    pub median_lead_secs: Option<f64>,
    /// Integrity warnings found in the snapshot
    pub warnings: Vec<IntegrityWarning>,
}
