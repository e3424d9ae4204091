//! Status machines for projects and problems.
//!
//! Legal moves live in one table per entity (from-state x operation ->
//! to-state). Everything else is rejected with a [`TransitionError`] and the
//! entity is left untouched.

use serde::{Deserialize, Serialize};
use crate::id::{EntityKind, UserId};
use crate::problem::{Problem, ProblemStatus};
use crate::project::{Project, ProjectStatus};
use crate::Time;

/// An operation on a problem's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProblemOp {
    /// Bind a user to an open problem
    Claim,
    /// Release a claimed or started problem back to the pool
    Unclaim,
    /// Begin work on a claimed problem
    Start,
    /// Finish a started problem
    Complete,
}

impl ProblemOp {
    /// Verb used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Unclaim => "unclaim",
            Self::Start => "start",
            Self::Complete => "complete",
        }
    }
}

/// An operation on a project's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectOp {
    /// Move to the next status
    Advance,
}

impl ProjectOp {
    /// Verb used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Advance => "advance",
        }
    }
}

const PROBLEM_TRANSITIONS: [(ProblemStatus, ProblemOp, ProblemStatus); 5] = [
    (ProblemStatus::Open, ProblemOp::Claim, ProblemStatus::Claimed),
    (ProblemStatus::Claimed, ProblemOp::Start, ProblemStatus::InProgress),
    (ProblemStatus::Claimed, ProblemOp::Unclaim, ProblemStatus::Open),
    (ProblemStatus::InProgress, ProblemOp::Unclaim, ProblemStatus::Open),
    (ProblemStatus::InProgress, ProblemOp::Complete, ProblemStatus::Completed),
];

const PROJECT_TRANSITIONS: [(ProjectStatus, ProjectOp, ProjectStatus); 2] = [
    (ProjectStatus::Open, ProjectOp::Advance, ProjectStatus::InProgress),
    (ProjectStatus::InProgress, ProjectOp::Advance, ProjectStatus::Completed),
];

/// A status precondition was not met.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {op} {entity} in status {from}")]
pub struct TransitionError {
    /// Kind of entity
    pub entity: EntityKind,
    /// Status the entity was in
    pub from: &'static str,
    /// Rejected operation
    pub op: &'static str,
}

/// Look up the status a problem moves to.
pub fn next_problem_status(
    from: ProblemStatus,
    op: ProblemOp,
) -> Result<ProblemStatus, TransitionError> {
    PROBLEM_TRANSITIONS
        .iter()
        .find(|(f, o, _)| *f == from && *o == op)
        .map(|(_, _, to)| *to)
        .ok_or(TransitionError {
            entity: EntityKind::Problem,
            from: from.as_str(),
            op: op.as_str(),
        })
}

/// Look up the status a project moves to.
pub fn next_project_status(
    from: ProjectStatus,
    op: ProjectOp,
) -> Result<ProjectStatus, TransitionError> {
    PROJECT_TRANSITIONS
        .iter()
        .find(|(f, o, _)| *f == from && *o == op)
        .map(|(_, _, to)| *to)
        .ok_or(TransitionError {
            entity: EntityKind::Project,
            from: from.as_str(),
            op: op.as_str(),
        })
}

/// A problem transition together with the data it stamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProblemAction {
    /// Claim for a user
    Claim {
        /// The claimant
        user: UserId,
    },
    /// Release the claim
    Unclaim,
    /// Start work
    Start,
    /// Complete the work
    Complete {
        /// Reference to the delivered artifact
        reference: Option<String>,
        /// Category points at the time of completion
        points: u32,
    },
}

impl ProblemAction {
    /// The status operation this action performs.
    pub fn op(&self) -> ProblemOp {
        match self {
            Self::Claim { .. } => ProblemOp::Claim,
            Self::Unclaim => ProblemOp::Unclaim,
            Self::Start => ProblemOp::Start,
            Self::Complete { .. } => ProblemOp::Complete,
        }
    }
}

impl Problem {
    /// Apply a transition, stamping timestamps at `now`.
    ///
    /// On error nothing is modified. Returns the previous status.
    pub fn apply(
        &mut self,
        action: ProblemAction,
        now: Time,
    ) -> Result<ProblemStatus, TransitionError> {
        let from = self.status;
        let to = next_problem_status(from, action.op())?;

        match action {
            ProblemAction::Claim { user } => {
                self.assignee = Some(user);
                // First claim wins; a re-claim keeps the original time.
                self.claimed_at.get_or_insert(now);
            }
            ProblemAction::Unclaim => {
                self.assignee = None;
            }
            ProblemAction::Start => {}
            ProblemAction::Complete { reference, points } => {
                self.completed_by = self.assignee.take();
                self.completed_at = Some(now);
                self.completion_reference = reference;
                self.points_awarded = Some(points);
            }
        }
        self.status = to;
        Ok(from)
    }
}

impl Project {
    /// Move the project one step along Open -> InProgress -> Completed.
    ///
    /// On error nothing is modified. Returns the previous status.
    pub fn advance(&mut self, now: Time) -> Result<ProjectStatus, TransitionError> {
        let from = self.status;
        let to = next_project_status(from, ProjectOp::Advance)?;
        if to == ProjectStatus::Completed {
            self.completed_at = Some(now);
        }
        self.status = to;
        Ok(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::CategoryId;
    use crate::project::PlannedDuration;
    use chrono::{Duration, Utc};

    fn open_problem() -> Problem {
        Problem::new("Parser crash", "", CategoryId::new(), None)
    }

    #[test]
    fn test_problem_table_covers_every_pair() {
        let ops = [
            ProblemOp::Claim,
            ProblemOp::Unclaim,
            ProblemOp::Start,
            ProblemOp::Complete,
        ];
        let mut allowed = 0;
        for from in ProblemStatus::ALL {
            for op in ops {
                if next_problem_status(from, op).is_ok() {
                    allowed += 1;
                }
            }
        }
        assert_eq!(allowed, PROBLEM_TRANSITIONS.len());
    }

    #[test]
    fn test_completed_is_terminal() {
        for op in [
            ProblemOp::Claim,
            ProblemOp::Unclaim,
            ProblemOp::Start,
            ProblemOp::Complete,
        ] {
            let err = next_problem_status(ProblemStatus::Completed, op).unwrap_err();
            assert_eq!(err.entity, EntityKind::Problem);
            assert_eq!(err.from, "Completed");
        }
    }

    #[test]
    fn test_cannot_start_unclaimed() {
        let err = next_problem_status(ProblemStatus::Open, ProblemOp::Start).unwrap_err();
        assert_eq!(err.to_string(), "cannot start problem in status Open");
    }

    #[test]
    fn test_full_problem_lifecycle() {
        let user = UserId::new();
        let mut problem = open_problem();
        let t0 = Utc::now();

        problem.apply(ProblemAction::Claim { user }, t0).unwrap();
        assert_eq!(problem.status, ProblemStatus::Claimed);
        assert_eq!(problem.assignee, Some(user));
        assert_eq!(problem.claimed_at, Some(t0));

        problem.apply(ProblemAction::Start, t0).unwrap();
        assert_eq!(problem.status, ProblemStatus::InProgress);

        let done = t0 + Duration::hours(3);
        let previous = problem
            .apply(
                ProblemAction::Complete {
                    reference: Some("PR #12".to_string()),
                    points: 5,
                },
                done,
            )
            .unwrap();
        assert_eq!(previous, ProblemStatus::InProgress);
        assert_eq!(problem.status, ProblemStatus::Completed);
        assert_eq!(problem.completed_at, Some(done));
        assert_eq!(problem.assignee, None);
        assert_eq!(problem.completed_by, Some(user));
        assert_eq!(problem.points_awarded, Some(5));
        assert!(problem.invariant_violations().is_empty());
    }

    #[test]
    fn test_reclaim_keeps_first_claim_time() {
        let first = UserId::new();
        let second = UserId::new();
        let mut problem = open_problem();
        let t0 = Utc::now();

        problem.apply(ProblemAction::Claim { user: first }, t0).unwrap();
        problem.apply(ProblemAction::Unclaim, t0 + Duration::minutes(5)).unwrap();
        assert_eq!(problem.status, ProblemStatus::Open);
        assert_eq!(problem.assignee, None);
        assert_eq!(problem.claimed_at, Some(t0));

        problem
            .apply(ProblemAction::Claim { user: second }, t0 + Duration::minutes(10))
            .unwrap();
        assert_eq!(problem.assignee, Some(second));
        assert_eq!(problem.claimed_at, Some(t0));
    }

    #[test]
    fn test_failed_transition_leaves_problem_untouched() {
        let mut problem = open_problem();
        let before = problem.clone();

        let err = problem
            .apply(
                ProblemAction::Complete {
                    reference: None,
                    points: 3,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err.op, "complete");
        assert_eq!(problem, before);
    }

    #[test]
    fn test_project_advance_sequence() {
        let mut project = Project::new("Sprint 1", "", PlannedDuration::TwoWeeks);
        let now = Utc::now();

        assert_eq!(project.advance(now).unwrap(), ProjectStatus::Open);
        assert_eq!(project.status, ProjectStatus::InProgress);
        assert!(project.completed_at.is_none());

        assert_eq!(project.advance(now).unwrap(), ProjectStatus::InProgress);
        assert_eq!(project.status, ProjectStatus::Completed);
        assert_eq!(project.completed_at, Some(now));

        let err = project.advance(now).unwrap_err();
        assert_eq!(err.entity, EntityKind::Project);
        assert_eq!(project.completed_at, Some(now));
    }
}
