//! Lifecycle controller - creation and status transitions.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tally_core::{
    next_problem_status, Category, CategoryId, EntityKind, PlannedDuration, Problem, ProblemAction,
    ProblemFilter, ProblemId, ProblemOp, ProblemStatus, Project, ProjectFilter, ProjectId,
    TransitionError, User, UserId,
};
use tally_storage::{Storage, StorageError};
use tracing::{debug, info, warn};

use crate::error::{LifecycleError, Result};

/// Controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// How many times a stale conditional update is retried with a fresh read
    pub stale_retries: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self { stale_retries: 1 }
    }
}

/// Specification for creating a project.
#[derive(Debug, Clone)]
pub struct ProjectSpec {
    /// Project name
    pub name: String,
    /// Description
    pub description: String,
    /// Planned length in weeks, 1 to 4
    pub planned_weeks: u8,
    /// Initial members; each must be a registered user
    pub members: Vec<UserId>,
}

/// Specification for creating a problem.
#[derive(Debug, Clone)]
pub struct ProblemSpec {
    /// Problem title
    pub title: String,
    /// Description
    pub description: String,
    /// Category deciding the point value
    pub category_id: CategoryId,
    /// Owning project, if any
    pub project_id: Option<ProjectId>,
}

/// The single authority for project and problem status changes.
pub struct LifecycleController<S: Storage> {
    storage: Arc<S>,
    config: ControllerConfig,
}

impl<S: Storage> LifecycleController<S> {
    /// Create a controller over a shared store.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            config: ControllerConfig::default(),
        }
    }

    /// Set configuration.
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// The underlying store.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    // === Users and categories ===

    /// Register a user under a unique name.
    pub async fn register_user(&self, name: &str) -> Result<User> {
        let user = User::new(non_empty("user name", name)?);
        self.storage.create_user(&user).await?;
        info!(user = %user.id, name = %user.name, "user registered");
        Ok(user)
    }

    /// Change a user's display name.
    pub async fn rename_user(&self, id: UserId, name: &str) -> Result<User> {
        let mut user = self.require_user(id).await?;
        user.name = non_empty("user name", name)?;
        self.storage.update_user(&user).await?;
        info!(user = %user.id, name = %user.name, "user renamed");
        Ok(user)
    }

    /// Add a category with a unique name.
    pub async fn add_category(&self, name: &str, points: u32) -> Result<Category> {
        let category = Category::new(non_empty("category name", name)?, points);
        self.storage.create_category(&category).await?;
        info!(category = %category.id, name = %category.name, points, "category added");
        Ok(category)
    }

    /// Change a category's point value.
    ///
    /// Already-completed problems pick up the new value in current-value
    /// analytics.
    pub async fn set_category_points(&self, id: CategoryId, points: u32) -> Result<Category> {
        let mut category = self
            .storage
            .load_category(id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(EntityKind::Category, id))?;
        let old = category.points;
        category.points = points;
        self.storage.update_category(&category).await?;
        info!(category = %id, old, new = points, "category points changed");
        Ok(category)
    }

    // === Projects ===

    /// Create an open project.
    pub async fn create_project(&self, spec: ProjectSpec) -> Result<Project> {
        let planned = PlannedDuration::try_from(spec.planned_weeks)
            .map_err(|e| LifecycleError::Validation(e.to_string()))?;
        let mut project = Project::new(
            non_empty("project name", &spec.name)?,
            spec.description,
            planned,
        );
        for member in spec.members {
            self.require_user(member).await?;
            project.members.insert(member);
        }

        self.storage.create_project(&project).await?;
        info!(project = %project.id, name = %project.name, weeks = planned.weeks(), "project created");
        Ok(project)
    }

    /// Add a user to a project's members.
    pub async fn add_project_member(&self, project_id: ProjectId, user_id: UserId) -> Result<Project> {
        self.require_user(user_id).await?;
        let project = self
            .modify_project(project_id, |project| {
                project.members.insert(user_id);
                Ok(())
            })
            .await?;
        info!(project = %project_id, user = %user_id, "member added");
        Ok(project)
    }

    /// Move a project Open -> InProgress or InProgress -> Completed.
    pub async fn advance_project(&self, project_id: ProjectId) -> Result<Project> {
        let project = self
            .modify_project(project_id, |project| {
                project.advance(Utc::now())?;
                Ok(())
            })
            .await?;
        info!(project = %project_id, status = %project.status, "project advanced");
        Ok(project)
    }

    /// Soft-archive a project. Archived projects take no further changes.
    pub async fn archive_project(&self, project_id: ProjectId) -> Result<Project> {
        let project = self
            .modify_project(project_id, |project| {
                project.archived_at = Some(Utc::now());
                Ok(())
            })
            .await?;
        info!(project = %project_id, "project archived");
        Ok(project)
    }

    /// Load a project.
    pub async fn get_project(&self, project_id: ProjectId) -> Result<Project> {
        self.storage
            .load_project(project_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(EntityKind::Project, project_id))
    }

    /// List projects.
    pub async fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>> {
        Ok(self.storage.list_projects(filter).await?)
    }

    // === Problems ===

    /// Create an open problem.
    pub async fn create_problem(&self, spec: ProblemSpec) -> Result<Problem> {
        self.storage
            .load_category(spec.category_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(EntityKind::Category, spec.category_id))?;
        if let Some(project_id) = spec.project_id {
            let project = self.get_project(project_id).await?;
            if project.is_archived() {
                return Err(LifecycleError::archived(EntityKind::Project, project_id));
            }
        }

        let problem = Problem::new(
            non_empty("problem title", &spec.title)?,
            spec.description,
            spec.category_id,
            spec.project_id,
        );
        self.storage.create_problem(&problem).await?;
        info!(problem = %problem.id, title = %problem.title, "problem created");
        Ok(problem)
    }

    /// Claim an open problem for a user.
    pub async fn claim(&self, problem_id: ProblemId, user_id: UserId) -> Result<Problem> {
        self.require_user(user_id).await?;
        self.transition(problem_id, ProblemAction::Claim { user: user_id })
            .await
    }

    /// Release a claimed or started problem back to Open.
    pub async fn unclaim(&self, problem_id: ProblemId) -> Result<Problem> {
        self.transition(problem_id, ProblemAction::Unclaim).await
    }

    /// Start work on a claimed problem.
    pub async fn start(&self, problem_id: ProblemId) -> Result<Problem> {
        self.transition(problem_id, ProblemAction::Start).await
    }

    /// Complete a started problem.
    pub async fn complete(&self, problem_id: ProblemId) -> Result<Problem> {
        self.finish(problem_id, None).await
    }

    /// Complete a started problem, recording what was delivered.
    pub async fn complete_with_reference(
        &self,
        problem_id: ProblemId,
        reference: impl Into<String>,
    ) -> Result<Problem> {
        self.finish(problem_id, Some(reference.into())).await
    }

    /// Soft-archive a problem that is Open or Completed.
    pub async fn archive_problem(&self, problem_id: ProblemId) -> Result<Problem> {
        let problem = self
            .modify_problem(problem_id, |problem| {
                if matches!(problem.status, ProblemStatus::Claimed | ProblemStatus::InProgress) {
                    return Err(TransitionError {
                        entity: EntityKind::Problem,
                        from: problem.status.as_str(),
                        op: "archive",
                    }
                    .into());
                }
                problem.archived_at = Some(Utc::now());
                Ok(())
            })
            .await?;
        info!(problem = %problem_id, "problem archived");
        Ok(problem)
    }

    /// Load a problem.
    pub async fn get_problem(&self, problem_id: ProblemId) -> Result<Problem> {
        self.storage
            .load_problem(problem_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(EntityKind::Problem, problem_id))
    }

    /// List problems.
    pub async fn list_problems(&self, filter: &ProblemFilter) -> Result<Vec<Problem>> {
        Ok(self.storage.list_problems(filter).await?)
    }

    // === Internals ===

    async fn finish(&self, problem_id: ProblemId, reference: Option<String>) -> Result<Problem> {
        let problem = self.get_problem(problem_id).await?;
        if problem.is_archived() {
            return Err(LifecycleError::archived(EntityKind::Problem, problem_id));
        }
        // Status precondition comes before the point lookup.
        next_problem_status(problem.status, ProblemOp::Complete)?;

        let category = self
            .storage
            .load_category(problem.category_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(EntityKind::Category, problem.category_id))?;

        self.transition(
            problem_id,
            ProblemAction::Complete {
                reference,
                points: category.points,
            },
        )
        .await
    }

    async fn transition(&self, problem_id: ProblemId, action: ProblemAction) -> Result<Problem> {
        let op = action.op();
        let problem = self
            .modify_problem(problem_id, |problem| {
                problem.apply(action.clone(), Utc::now())?;
                Ok(())
            })
            .await?;
        info!(problem = %problem_id, op = op.as_str(), status = %problem.status, "problem transitioned");
        Ok(problem)
    }

    /// Read, modify and conditionally write a problem, retrying stale writes.
    async fn modify_problem<F>(&self, problem_id: ProblemId, change: F) -> Result<Problem>
    where
        F: Fn(&mut Problem) -> Result<()> + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let current = self.get_problem(problem_id).await?;
            if current.is_archived() {
                return Err(LifecycleError::archived(EntityKind::Problem, problem_id));
            }

            let mut next = current.clone();
            change(&mut next)?;

            match self.storage.update_problem(current.status, &next).await {
                Ok(stored) => return Ok(stored),
                Err(StorageError::Stale { .. }) if attempt < self.config.stale_retries => {
                    attempt += 1;
                    debug!(problem = %problem_id, attempt, "stale write, re-reading");
                }
                Err(err) => {
                    if matches!(err, StorageError::Stale { .. }) {
                        warn!(problem = %problem_id, "giving up on stale write");
                    }
                    return Err(err.into());
                }
            }
        }
    }

    /// Read, modify and conditionally write a project, retrying stale writes.
    async fn modify_project<F>(&self, project_id: ProjectId, change: F) -> Result<Project>
    where
        F: Fn(&mut Project) -> Result<()> + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let current = self.get_project(project_id).await?;
            if current.is_archived() {
                return Err(LifecycleError::archived(EntityKind::Project, project_id));
            }

            let mut next = current.clone();
            change(&mut next)?;

            match self.storage.update_project(current.status, &next).await {
                Ok(stored) => return Ok(stored),
                Err(StorageError::Stale { .. }) if attempt < self.config.stale_retries => {
                    attempt += 1;
                    debug!(project = %project_id, attempt, "stale write, re-reading");
                }
                Err(err) => {
                    if matches!(err, StorageError::Stale { .. }) {
                        warn!(project = %project_id, "giving up on stale write");
                    }
                    return Err(err.into());
                }
            }
        }
    }

    async fn require_user(&self, id: UserId) -> Result<User> {
        self.storage
            .load_user(id)
            .await?
            .ok_or_else(|| LifecycleError::not_found(EntityKind::User, id))
    }
}

fn non_empty(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_storage::MemoryStorage;

    struct Fixture {
        controller: LifecycleController<MemoryStorage>,
        user: User,
        category: Category,
    }

    async fn fixture() -> Fixture {
        let controller = LifecycleController::new(Arc::new(MemoryStorage::new()));
        let user = controller.register_user("ada").await.unwrap();
        let category = controller.add_category("Bug", 5).await.unwrap();
        Fixture {
            controller,
            user,
            category,
        }
    }

    async fn open_problem(f: &Fixture) -> Problem {
        f.controller
            .create_problem(ProblemSpec {
                title: "Crash on save".to_string(),
                description: String::new(),
                category_id: f.category.id,
                project_id: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_claim_start_complete() {
        let f = fixture().await;
        let problem = open_problem(&f).await;

        let claimed = f.controller.claim(problem.id, f.user.id).await.unwrap();
        assert_eq!(claimed.status, ProblemStatus::Claimed);
        assert_eq!(claimed.assignee, Some(f.user.id));
        assert!(claimed.claimed_at.is_some());

        f.controller.start(problem.id).await.unwrap();
        let done = f
            .controller
            .complete_with_reference(problem.id, "commit abc123")
            .await
            .unwrap();
        assert_eq!(done.status, ProblemStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.completed_by, Some(f.user.id));
        assert_eq!(done.assignee, None);
        assert_eq!(done.points_awarded, Some(5));
        assert_eq!(done.completion_reference.as_deref(), Some("commit abc123"));
        assert!(done.invariant_violations().is_empty());
    }

    #[tokio::test]
    async fn test_claim_unknown_ids() {
        let f = fixture().await;
        let problem = open_problem(&f).await;

        let err = f.controller.claim(problem.id, UserId::new()).await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::NotFound {
                kind: EntityKind::User,
                ..
            }
        ));

        let err = f.controller.claim(ProblemId::new(), f.user.id).await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::NotFound {
                kind: EntityKind::Problem,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_complete_requires_in_progress() {
        let f = fixture().await;
        let problem = open_problem(&f).await;
        f.controller.claim(problem.id, f.user.id).await.unwrap();
        let before = f.controller.get_problem(problem.id).await.unwrap();

        let err = f.controller.complete(problem.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition(_)));
        assert_eq!(f.controller.get_problem(problem.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_complete_checks_status_before_category() {
        let f = fixture().await;
        let orphan = Problem::new("No category", "", CategoryId::new(), None);
        f.controller.storage().create_problem(&orphan).await.unwrap();

        let err = f.controller.complete(orphan.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition(_)));
        let stored = f.controller.get_problem(orphan.id).await.unwrap();
        assert_eq!(stored.status, ProblemStatus::Open);
        assert!(stored.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_complete_archived_problem_is_rejected() {
        let f = fixture().await;
        let problem = open_problem(&f).await;
        f.controller.archive_problem(problem.id).await.unwrap();

        let err = f.controller.complete(problem.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Archived { .. }));
    }

    #[tokio::test]
    async fn test_start_requires_claim() {
        let f = fixture().await;
        let problem = open_problem(&f).await;

        let err = f.controller.start(problem.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_unclaim_then_reclaim_keeps_first_claim() {
        let f = fixture().await;
        let other = f.controller.register_user("grace").await.unwrap();
        let problem = open_problem(&f).await;

        let first = f.controller.claim(problem.id, f.user.id).await.unwrap();
        f.controller.start(problem.id).await.unwrap();
        let released = f.controller.unclaim(problem.id).await.unwrap();
        assert_eq!(released.status, ProblemStatus::Open);
        assert_eq!(released.assignee, None);
        assert_eq!(released.claimed_at, first.claimed_at);

        let second = f.controller.claim(problem.id, other.id).await.unwrap();
        assert_eq!(second.assignee, Some(other.id));
        assert_eq!(second.claimed_at, first.claimed_at);
    }

    #[tokio::test]
    async fn test_unclaim_open_problem_fails() {
        let f = fixture().await;
        let problem = open_problem(&f).await;

        let err = f.controller.unclaim(problem.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_project_lifecycle() {
        let f = fixture().await;
        let project = f
            .controller
            .create_project(ProjectSpec {
                name: "Sprint 1".to_string(),
                description: "first sprint".to_string(),
                planned_weeks: 2,
                members: vec![f.user.id],
            })
            .await
            .unwrap();
        assert_eq!(project.members.len(), 1);

        let started = f.controller.advance_project(project.id).await.unwrap();
        assert_eq!(started.status, tally_core::ProjectStatus::InProgress);
        assert!(started.completed_at.is_none());

        let finished = f.controller.advance_project(project.id).await.unwrap();
        assert_eq!(finished.status, tally_core::ProjectStatus::Completed);
        assert!(finished.completed_at.is_some());

        let err = f.controller.advance_project(project.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_project_rejects_bad_duration_and_unknown_member() {
        let f = fixture().await;
        let err = f
            .controller
            .create_project(ProjectSpec {
                name: "Too long".to_string(),
                description: String::new(),
                planned_weeks: 6,
                members: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));

        let err = f
            .controller
            .create_project(ProjectSpec {
                name: "Ghost team".to_string(),
                description: String::new(),
                planned_weeks: 1,
                members: vec![UserId::new()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_category() {
        let f = fixture().await;
        let err = f.controller.add_category("Bug", 1).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_problem_needs_known_category() {
        let f = fixture().await;
        let err = f
            .controller
            .create_problem(ProblemSpec {
                title: "Orphan".to_string(),
                description: String::new(),
                category_id: CategoryId::new(),
                project_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::NotFound {
                kind: EntityKind::Category,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_archived_problem_is_frozen() {
        let f = fixture().await;
        let problem = open_problem(&f).await;

        let archived = f.controller.archive_problem(problem.id).await.unwrap();
        assert!(archived.is_archived());

        let err = f.controller.claim(problem.id, f.user.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Archived { .. }));
        assert!(f
            .controller
            .list_problems(&ProblemFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_cannot_archive_held_problem() {
        let f = fixture().await;
        let problem = open_problem(&f).await;
        f.controller.claim(problem.id, f.user.id).await.unwrap();

        let err = f.controller.archive_problem(problem.id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_set_category_points() {
        let f = fixture().await;
        let updated = f.controller.set_category_points(f.category.id, 8).await.unwrap();
        assert_eq!(updated.points, 8);

        let err = f
            .controller
            .set_category_points(CategoryId::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_blank_names_rejected() {
        let f = fixture().await;
        let err = f.controller.register_user("   ").await.unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }
}
