//! Problem model - the unit of work that gets claimed and completed.

use serde::{Deserialize, Serialize};
use crate::id::{CategoryId, ProblemId, ProjectId, UserId};
use crate::Time;

/// A problem is a unit of work worth the points of its category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Unique identifier
    pub id: ProblemId,

    /// Problem title
    pub title: String,

    /// Detailed description
    pub description: String,

    /// Category deciding the point value
    pub category_id: CategoryId,

    /// Owning project, if any
    pub project_id: Option<ProjectId>,

    /// Current status
    pub status: ProblemStatus,

    /// Current claimant; set only while Claimed or InProgress
    pub assignee: Option<UserId>,

    /// Who finished it; set on completion
    pub completed_by: Option<UserId>,

    /// Creation timestamp
    pub created_at: Time,

    /// First claim time, kept through unclaims
    pub claimed_at: Option<Time>,

    /// Set on the transition to `Completed`, never otherwise
    pub completed_at: Option<Time>,

    /// Reference to the delivered artifact, recorded at completion
    pub completion_reference: Option<String>,

    /// Category points captured at completion
    pub points_awarded: Option<u32>,

    /// Soft archival marker
    pub archived_at: Option<Time>,

    /// Store revision of this record, bumped on every conditional update
    #[serde(default)]
    pub revision: u64,
}

impl Problem {
    /// Create a new open problem.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category_id: CategoryId,
        project_id: Option<ProjectId>,
    ) -> Self {
        Self {
            id: ProblemId::new(),
            title: title.into(),
            description: description.into(),
            category_id,
            project_id,
            status: ProblemStatus::Open,
            assignee: None,
            completed_by: None,
            created_at: chrono::Utc::now(),
            claimed_at: None,
            completed_at: None,
            completion_reference: None,
            points_awarded: None,
            archived_at: None,
            revision: 0,
        }
    }

    /// Whether the problem has been archived.
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Timestamp and ownership invariants this record breaks, if any.
    ///
    /// An Open problem may still carry `claimed_at` after an unclaim.
    pub fn invariant_violations(&self) -> Vec<&'static str> {
        let mut violations = Vec::new();
        let completed = self.status == ProblemStatus::Completed;
        let held = matches!(self.status, ProblemStatus::Claimed | ProblemStatus::InProgress);

        if completed != self.completed_at.is_some() {
            violations.push("completed_at does not match Completed status");
        }
        if (held || completed) && self.claimed_at.is_none() {
            violations.push("claimed problem has no claimed_at");
        }
        if held != self.assignee.is_some() {
            violations.push("assignee does not match Claimed/InProgress status");
        }
        if completed && self.completed_by.is_none() {
            violations.push("completed problem has no completed_by");
        }
        violations
    }
}

/// Problem status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProblemStatus {
    /// Unassigned, available to claim
    Open,
    /// Bound to a user, not started
    Claimed,
    /// Being worked on
    InProgress,
    /// Finished (terminal)
    Completed,
}

impl ProblemStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [ProblemStatus; 4] = [
        Self::Open,
        Self::Claimed,
        Self::InProgress,
        Self::Completed,
    ];

    /// Display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Claimed => "Claimed",
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for ProblemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter for querying problems.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemFilter {
    /// Filter by status
    pub status: Option<Vec<ProblemStatus>>,

    /// Filter by project
    pub project_id: Option<ProjectId>,

    /// Filter by current assignee
    pub assignee: Option<UserId>,

    /// Filter by category
    pub category_id: Option<CategoryId>,

    /// Include archived problems
    pub include_archived: bool,
}

impl ProblemFilter {
    /// Whether a problem passes this filter.
    pub fn matches(&self, problem: &Problem) -> bool {
        if !self.include_archived && problem.is_archived() {
            return false;
        }
        if let Some(statuses) = &self.status {
            if !statuses.contains(&problem.status) {
                return false;
            }
        }
        if self.project_id.is_some() && problem.project_id != self.project_id {
            return false;
        }
        if self.assignee.is_some() && problem.assignee != self.assignee {
            return false;
        }
        if let Some(category_id) = self.category_id {
            if problem.category_id != category_id {
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
    fn test_new_problem_is_consistent() {
        let problem = Problem::new("Fix login", "", CategoryId::new(), None);
        assert_eq!(problem.status, ProblemStatus::Open);
        assert!(problem.invariant_violations().is_empty());
    }

    #[test]
    fn test_invariant_violations_detected() {
        let mut problem = Problem::new("Broken", "", CategoryId::new(), None);
        problem.status = ProblemStatus::Completed;

        let violations = problem.invariant_violations();
        assert!(violations.contains(&"completed_at does not match Completed status"));
        assert!(violations.contains(&"claimed problem has no claimed_at"));
        assert!(violations.contains(&"completed problem has no completed_by"));
    }

    #[test]
    fn test_open_problem_may_keep_claimed_at() {
        let mut problem = Problem::new("Released", "", CategoryId::new(), None);
        problem.claimed_at = Some(chrono::Utc::now());
        assert!(problem.invariant_violations().is_empty());
    }

    #[test]
    fn test_filter_by_status_and_project() {
        let project = ProjectId::new();
        let problem = Problem::new("In project", "", CategoryId::new(), Some(project));

        let open_in_project = ProblemFilter {
            status: Some(vec![ProblemStatus::Open]),
            project_id: Some(project),
            ..Default::default()
        };
        assert!(open_in_project.matches(&problem));

        let elsewhere = ProblemFilter {
            project_id: Some(ProjectId::new()),
            ..Default::default()
        };
        assert!(!elsewhere.matches(&problem));

        let completed = ProblemFilter {
            status: Some(vec![ProblemStatus::Completed]),
            ..Default::default()
        };
        assert!(!completed.matches(&problem));
    }
}
