//! In-memory storage implementation.
//!
//! All tables sit behind one `RwLock`, so every write and every snapshot is
//! atomic with respect to the others.

use std::collections::BTreeMap;

use tally_core::{
    Category, CategoryId, EntityKind, Problem, ProblemFilter, ProblemId, ProblemStatus, Project,
    ProjectFilter, ProjectId, ProjectStatus, User, UserId,
};
use tokio::sync::RwLock;
use tracing::debug;

use super::trait_::check_current;
use super::{Result, Snapshot, Storage, StorageError};

#[derive(Debug, Default)]
struct Tables {
    revision: u64,
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    projects: BTreeMap<ProjectId, Project>,
    problems: BTreeMap<ProblemId, Problem>,
}

/// Volatile storage backend, used by tests and one-shot sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn create_user(&self, user: &User) -> Result<UserId> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.id) {
            return Err(StorageError::Conflict(format!("user id {} exists", user.id)));
        }
        if tables.users.values().any(|u| u.name == user.name) {
            return Err(StorageError::Conflict(format!("user name '{}' is taken", user.name)));
        }
        tables.users.insert(user.id, user.clone());
        tables.revision += 1;
        Ok(user.id)
    }

    async fn load_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user.id) {
            return Err(StorageError::not_found(EntityKind::User, user.id));
        }
        if tables.users.values().any(|u| u.id != user.id && u.name == user.name) {
            return Err(StorageError::Conflict(format!("user name '{}' is taken", user.name)));
        }
        tables.users.insert(user.id, user.clone());
        tables.revision += 1;
        Ok(())
    }

    async fn create_category(&self, category: &Category) -> Result<CategoryId> {
        let mut tables = self.tables.write().await;
        if tables.categories.contains_key(&category.id) {
            return Err(StorageError::Conflict(format!("category id {} exists", category.id)));
        }
        if tables.categories.values().any(|c| c.name == category.name) {
            return Err(StorageError::Conflict(format!(
                "category name '{}' is taken",
                category.name
            )));
        }
        tables.categories.insert(category.id, category.clone());
        tables.revision += 1;
        Ok(category.id)
    }

    async fn load_category(&self, id: CategoryId) -> Result<Option<Category>> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.tables.read().await.categories.values().cloned().collect())
    }

    async fn update_category(&self, category: &Category) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.categories.contains_key(&category.id) {
            return Err(StorageError::not_found(EntityKind::Category, category.id));
        }
        if tables
            .categories
            .values()
            .any(|c| c.id != category.id && c.name == category.name)
        {
            return Err(StorageError::Conflict(format!(
                "category name '{}' is taken",
                category.name
            )));
        }
        tables.categories.insert(category.id, category.clone());
        tables.revision += 1;
        Ok(())
    }

    async fn create_project(&self, project: &Project) -> Result<ProjectId> {
        let mut tables = self.tables.write().await;
        if tables.projects.contains_key(&project.id) {
            return Err(StorageError::Conflict(format!("project id {} exists", project.id)));
        }
        tables.projects.insert(project.id, project.clone());
        tables.revision += 1;
        Ok(project.id)
    }

    async fn load_project(&self, id: ProjectId) -> Result<Option<Project>> {
        Ok(self.tables.read().await.projects.get(&id).cloned())
    }

    async fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>> {
        Ok(self
            .tables
            .read()
            .await
            .projects
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn update_project(&self, expected: ProjectStatus, project: &Project) -> Result<Project> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .projects
            .get(&project.id)
            .map(|p| (p.status, p.revision));
        check_current(
            EntityKind::Project,
            project.id,
            stored,
            expected,
            project.revision,
        )?;

        let mut next = project.clone();
        next.revision += 1;
        tables.projects.insert(next.id, next.clone());
        tables.revision += 1;
        debug!(project = %next.id, revision = next.revision, "project updated");
        Ok(next)
    }

    async fn create_problem(&self, problem: &Problem) -> Result<ProblemId> {
        let mut tables = self.tables.write().await;
        if tables.problems.contains_key(&problem.id) {
            return Err(StorageError::Conflict(format!("problem id {} exists", problem.id)));
        }
        tables.problems.insert(problem.id, problem.clone());
        tables.revision += 1;
        Ok(problem.id)
    }

    async fn load_problem(&self, id: ProblemId) -> Result<Option<Problem>> {
        Ok(self.tables.read().await.problems.get(&id).cloned())
    }

    async fn list_problems(&self, filter: &ProblemFilter) -> Result<Vec<Problem>> {
        Ok(self
            .tables
            .read()
            .await
            .problems
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn update_problem(&self, expected: ProblemStatus, problem: &Problem) -> Result<Problem> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .problems
            .get(&problem.id)
            .map(|p| (p.status, p.revision));
        check_current(
            EntityKind::Problem,
            problem.id,
            stored,
            expected,
            problem.revision,
        )?;

        let mut next = problem.clone();
        next.revision += 1;
        tables.problems.insert(next.id, next.clone());
        tables.revision += 1;
        debug!(problem = %next.id, revision = next.revision, "problem updated");
        Ok(next)
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let tables = self.tables.read().await;
        Ok(Snapshot {
            revision: tables.revision,
            users: tables.users.values().cloned().collect(),
            categories: tables.categories.values().cloned().collect(),
            projects: tables.projects.values().cloned().collect(),
            problems: tables.problems.values().cloned().collect(),
            unreadable: Vec::new(),
        })
    }

    async fn revision(&self) -> Result<u64> {
        Ok(self.tables.read().await.revision)
    }
}
