//! Data-integrity scanning.
//!
//! Warnings never fail a report; they travel alongside it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tally_core::{timing, EntityKind, Elapsed};
use tally_storage::Snapshot;
use tracing::warn;

/// Kind of integrity problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// A derived duration came out negative
    NegativeDuration,
    /// A record points at an id that is not in the store
    OrphanedReference,
    /// A record's status and timestamps disagree
    InvariantViolation,
    /// A stored record could not be decoded and is missing from the report
    UnreadableRecord,
}

/// A non-fatal problem found while reading the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityWarning {
    /// What went wrong
    pub kind: WarningKind,
    /// Kind of the offending record
    pub entity: EntityKind,
    /// Id of the offending record
    pub id: String,
    /// Human-readable detail
    pub message: String,
}

impl IntegrityWarning {
    fn new(
        kind: WarningKind,
        entity: EntityKind,
        id: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            entity,
            id: id.to_string(),
            message: message.into(),
        }
    }
}

/// Scan every record in the snapshot.
///
/// The result is ordered by record (projects first, then problems, each in
/// id order, then records that could not be read) so repeated scans of one
/// snapshot compare equal.
pub fn scan(snapshot: &Snapshot) -> Vec<IntegrityWarning> {
    let users: HashSet<_> = snapshot.users.iter().map(|u| u.id).collect();
    let categories: HashSet<_> = snapshot.categories.iter().map(|c| c.id).collect();
    let projects: HashSet<_> = snapshot.projects.iter().map(|p| p.id).collect();
    let mut warnings = Vec::new();

    for project in &snapshot.projects {
        for violation in project.invariant_violations() {
            warnings.push(IntegrityWarning::new(
                WarningKind::InvariantViolation,
                EntityKind::Project,
                project.id,
                violation,
            ));
        }
        for member in &project.members {
            if !users.contains(member) {
                warnings.push(IntegrityWarning::new(
                    WarningKind::OrphanedReference,
                    EntityKind::Project,
                    project.id,
                    format!("member {} does not exist", member),
                ));
            }
        }
        check_negative(
            &mut warnings,
            EntityKind::Project,
            project.id,
            "project duration",
            timing::project_duration(project),
        );
    }

    for problem in &snapshot.problems {
        for violation in problem.invariant_violations() {
            warnings.push(IntegrityWarning::new(
                WarningKind::InvariantViolation,
                EntityKind::Problem,
                problem.id,
                violation,
            ));
        }
        if !categories.contains(&problem.category_id) {
            warnings.push(IntegrityWarning::new(
                WarningKind::OrphanedReference,
                EntityKind::Problem,
                problem.id,
                format!("category {} does not exist", problem.category_id),
            ));
        }
        if let Some(project_id) = problem.project_id {
            if !projects.contains(&project_id) {
                warnings.push(IntegrityWarning::new(
                    WarningKind::OrphanedReference,
                    EntityKind::Problem,
                    problem.id,
                    format!("project {} does not exist", project_id),
                ));
            }
        }
        for (role, user) in [("assignee", problem.assignee), ("completed_by", problem.completed_by)] {
            if let Some(user) = user {
                if !users.contains(&user) {
                    warnings.push(IntegrityWarning::new(
                        WarningKind::OrphanedReference,
                        EntityKind::Problem,
                        problem.id,
                        format!("{} {} does not exist", role, user),
                    ));
                }
            }
        }
        check_negative(
            &mut warnings,
            EntityKind::Problem,
            problem.id,
            "time to claim",
            timing::time_to_claim(problem),
        );
        check_negative(
            &mut warnings,
            EntityKind::Problem,
            problem.id,
            "time to complete",
            timing::time_to_complete(problem),
        );
    }

    for record in &snapshot.unreadable {
        warnings.push(IntegrityWarning::new(
            WarningKind::UnreadableRecord,
            record.kind,
            &record.id,
            format!("record could not be read: {}", record.reason),
        ));
    }

    for warning in &warnings {
        warn!(
            kind = ?warning.kind,
            entity = %warning.entity,
            id = %warning.id,
            "{}",
            warning.message
        );
    }
    warnings
}

fn check_negative(
    warnings: &mut Vec<IntegrityWarning>,
    entity: EntityKind,
    id: impl ToString,
    what: &str,
    elapsed: Option<Elapsed>,
) {
    if let Some(elapsed) = elapsed.filter(Elapsed::is_negative) {
        warnings.push(IntegrityWarning::new(
            WarningKind::NegativeDuration,
            entity,
            id,
            format!("{} is negative ({}s)", what, elapsed.as_secs_f64()),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tally_core::{Category, PlannedDuration, Problem, ProblemStatus, Project, User};
    use tally_storage::UnreadableRecord;

    #[test]
    fn test_clean_snapshot_has_no_warnings() {
        let category = Category::new("Bug", 5);
        let snapshot = Snapshot {
            users: vec![User::new("ada")],
            problems: vec![Problem::new("ok", "", category.id, None)],
            categories: vec![category],
            ..Default::default()
        };
        assert!(scan(&snapshot).is_empty());
    }

    #[test]
    fn test_orphaned_category_and_project() {
        let problem = Problem::new(
            "lost",
            "",
            tally_core::CategoryId::new(),
            Some(tally_core::ProjectId::new()),
        );
        let snapshot = Snapshot {
            problems: vec![problem],
            ..Default::default()
        };

        let warnings = scan(&snapshot);
        assert_eq!(warnings.len(), 2);
        assert!(warnings
            .iter()
            .all(|w| w.kind == WarningKind::OrphanedReference));
    }

    #[test]
    fn test_negative_completion_time() {
        let user = User::new("ada");
        let category = Category::new("Bug", 5);
        let mut problem = Problem::new("skewed", "", category.id, None);
        problem.status = ProblemStatus::Completed;
        problem.completed_by = Some(user.id);
        problem.claimed_at = Some(problem.created_at + Duration::hours(2));
        problem.completed_at = Some(problem.created_at + Duration::hours(1));

        let snapshot = Snapshot {
            users: vec![user],
            categories: vec![category],
            problems: vec![problem],
            ..Default::default()
        };

        let warnings = scan(&snapshot);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::NegativeDuration);
        assert!(warnings[0].message.starts_with("time to complete"));
    }

    #[test]
    fn test_unreadable_records_become_warnings() {
        let snapshot = Snapshot {
            unreadable: vec![UnreadableRecord {
                kind: EntityKind::Problem,
                id: "01HZZZZZZZZZZZZZZZZZZZZZZZ".to_string(),
                reason: "expected value at line 1 column 3".to_string(),
            }],
            ..Default::default()
        };

        let warnings = scan(&snapshot);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::UnreadableRecord);
        assert_eq!(warnings[0].entity, EntityKind::Problem);
        assert_eq!(warnings[0].id, "01HZZZZZZZZZZZZZZZZZZZZZZZ");
    }

    #[test]
    fn test_project_invariant_violation() {
        let mut project = Project::new("Half done", "", PlannedDuration::OneWeek);
        project.status = tally_core::ProjectStatus::Completed;

        let snapshot = Snapshot {
            projects: vec![project],
            ..Default::default()
        };

        let warnings = scan(&snapshot);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::InvariantViolation);
        assert_eq!(warnings[0].entity, EntityKind::Project);
    }
}
