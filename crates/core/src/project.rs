//! Project model - time-boxed containers for problems.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use crate::id::{ProjectId, UserId};
use crate::Time;

/// A project groups problems under a planned duration of one to four weeks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier
    pub id: ProjectId,

    /// Project name
    pub name: String,

    /// Description
    pub description: String,

    /// Planned duration
    pub planned_duration: PlannedDuration,

    /// Current status
    pub status: ProjectStatus,

    /// Users working on the project
    pub members: BTreeSet<UserId>,

    /// When created
    pub created_at: Time,

    /// Set on the transition to `Completed`, never otherwise
    pub completed_at: Option<Time>,

    /// Soft archival marker
    pub archived_at: Option<Time>,

    /// Store revision of this record, bumped on every conditional update
    #[serde(default)]
    pub revision: u64,
}

impl Project {
    /// Create a new open project.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        planned_duration: PlannedDuration,
    ) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            description: description.into(),
            planned_duration,
            status: ProjectStatus::Open,
            members: BTreeSet::new(),
            created_at: chrono::Utc::now(),
            completed_at: None,
            archived_at: None,
            revision: 0,
        }
    }

    /// Whether the project has been archived.
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Timestamp invariants this record breaks, if any.
    pub fn invariant_violations(&self) -> Vec<&'static str> {
        let mut violations = Vec::new();
        match (self.status, self.completed_at) {
            (ProjectStatus::Completed, None) => {
                violations.push("completed project has no completed_at")
            }
            (ProjectStatus::Open | ProjectStatus::InProgress, Some(_)) => {
                violations.push("unfinished project has completed_at")
            }
            _ => {}
        }
        violations
    }
}

/// Project status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProjectStatus {
    /// Created, not started
    Open,
    /// Work under way
    InProgress,
    /// Finished (terminal)
    Completed,
}

impl ProjectStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [ProjectStatus; 3] = [Self::Open, Self::InProgress, Self::Completed];

    /// Display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Planned duration of a project, in whole weeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PlannedDuration {
    /// 1 week
    OneWeek,
    /// 2 weeks
    TwoWeeks,
    /// 3 weeks
    ThreeWeeks,
    /// 4 weeks
    FourWeeks,
}

impl PlannedDuration {
    /// All durations, shortest first.
    pub const ALL: [PlannedDuration; 4] = [
        Self::OneWeek,
        Self::TwoWeeks,
        Self::ThreeWeeks,
        Self::FourWeeks,
    ];

    /// Number of weeks.
    pub fn weeks(&self) -> u8 {
        match self {
            Self::OneWeek => 1,
            Self::TwoWeeks => 2,
            Self::ThreeWeeks => 3,
            Self::FourWeeks => 4,
        }
    }

    /// Length as a chrono duration.
    pub fn as_duration(&self) -> chrono::Duration {
        chrono::Duration::weeks(i64::from(self.weeks()))
    }
}

/// A planned duration outside 1..=4 weeks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("planned duration must be 1 to 4 weeks, got {0}")]
pub struct PlannedDurationError(pub u8);

impl TryFrom<u8> for PlannedDuration {
    type Error = PlannedDurationError;

    fn try_from(weeks: u8) -> Result<Self, Self::Error> {
        match weeks {
            1 => Ok(Self::OneWeek),
            2 => Ok(Self::TwoWeeks),
            3 => Ok(Self::ThreeWeeks),
            4 => Ok(Self::FourWeeks),
            other => Err(PlannedDurationError(other)),
        }
    }
}

impl From<PlannedDuration> for u8 {
    fn from(duration: PlannedDuration) -> Self {
        duration.weeks()
    }
}

/// Filter for querying projects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectFilter {
    /// Filter by status
    pub status: Option<Vec<ProjectStatus>>,

    /// Only projects this user is a member of
    pub member: Option<UserId>,

    /// Include archived projects
    pub include_archived: bool,
}

impl ProjectFilter {
    /// Whether a project passes this filter.
    pub fn matches(&self, project: &Project) -> bool {
        if !self.include_archived && project.is_archived() {
            return false;
        }
        if let Some(statuses) = &self.status {
            if !statuses.contains(&project.status) {
                return false;
            }
        }
        if let Some(member) = self.member {
            if !project.members.contains(&member) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planned_duration_bounds() {
        assert_eq!(PlannedDuration::try_from(1u8), Ok(PlannedDuration::OneWeek));
        assert_eq!(PlannedDuration::try_from(4u8), Ok(PlannedDuration::FourWeeks));
        assert_eq!(PlannedDuration::try_from(0u8), Err(PlannedDurationError(0)));
        assert_eq!(PlannedDuration::try_from(5u8), Err(PlannedDurationError(5)));
    }

    #[test]
    fn test_planned_duration_serializes_as_weeks() {
        let json = serde_json::to_string(&PlannedDuration::ThreeWeeks).unwrap();
        assert_eq!(json, "3");
        assert!(serde_json::from_str::<PlannedDuration>("7").is_err());
    }

    #[test]
    fn test_new_project_is_open() {
        let project = Project::new("Sprint", "", PlannedDuration::TwoWeeks);
        assert_eq!(project.status, ProjectStatus::Open);
        assert!(project.completed_at.is_none());
        assert!(project.invariant_violations().is_empty());
    }

    #[test]
    fn test_filter_hides_archived() {
        let mut project = Project::new("Old", "", PlannedDuration::OneWeek);
        project.archived_at = Some(chrono::Utc::now());

        assert!(!ProjectFilter::default().matches(&project));
        let filter = ProjectFilter {
            include_archived: true,
            ..Default::default()
        };
        assert!(filter.matches(&project));
    }

    #[test]
    fn test_filter_by_member() {
        let user = UserId::new();
        let mut project = Project::new("Team", "", PlannedDuration::OneWeek);
        let filter = ProjectFilter {
            member: Some(user),
            ..Default::default()
        };
        assert!(!filter.matches(&project));
        project.members.insert(user);
        assert!(filter.matches(&project));
    }
}
