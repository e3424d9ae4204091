//! Storage trait abstraction.

use async_trait::async_trait;
use tally_core::{
    Category, CategoryId, EntityKind, Problem, ProblemFilter, ProblemId, ProblemStatus, Project,
    ProjectFilter, ProjectId, ProjectStatus, User, UserId,
};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of record
        kind: EntityKind,
        /// Requested id
        id: String,
    },

    /// A conditional update observed a different status or revision
    #[error("{kind} {id} changed since it was read")]
    Stale {
        /// Kind of record
        kind: EntityKind,
        /// Record id
        id: String,
    },

    /// Unique name or id already taken
    #[error("conflict: {0}")]
    Conflict(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl StorageError {
    pub(crate) fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn stale(kind: EntityKind, id: impl ToString) -> Self {
        Self::Stale {
            kind,
            id: id.to_string(),
        }
    }
}

/// A record file that exists but could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableRecord {
    /// Kind of record, from the directory it sits in
    pub kind: EntityKind,
    /// Record id, from the file name
    pub id: String,
    /// Why decoding failed
    pub reason: String,
}

/// Every record in the store as of one store revision.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Store revision the snapshot was taken at
    pub revision: u64,

    /// All users, ordered by id
    pub users: Vec<User>,

    /// All categories, ordered by id
    pub categories: Vec<Category>,

    /// All projects, archived included, ordered by id
    pub projects: Vec<Project>,

    /// All problems, archived included, ordered by id
    pub problems: Vec<Problem>,

    /// Records skipped because they could not be read
    pub unreadable: Vec<UnreadableRecord>,
}

/// Entity store for tally data.
///
/// Users and categories carry no status and are updated in place. Projects
/// and problems are only ever rewritten through the conditional updates,
/// which succeed only when the stored record still has the expected status
/// and the revision the caller read.
#[async_trait]
pub trait Storage: Send + Sync {
    // === User operations ===

    /// Insert a new user; fails with `Conflict` on a taken name.
    async fn create_user(&self, user: &User) -> Result<UserId>;

    /// Load a user by ID.
    async fn load_user(&self, id: UserId) -> Result<Option<User>>;

    /// List all users.
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Overwrite an existing user.
    async fn update_user(&self, user: &User) -> Result<()>;

    // === Category operations ===

    /// Insert a new category; fails with `Conflict` on a taken name.
    async fn create_category(&self, category: &Category) -> Result<CategoryId>;

    /// Load a category by ID.
    async fn load_category(&self, id: CategoryId) -> Result<Option<Category>>;

    /// List all categories.
    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Overwrite an existing category.
    async fn update_category(&self, category: &Category) -> Result<()>;

    // === Project operations ===

    /// Insert a new project.
    async fn create_project(&self, project: &Project) -> Result<ProjectId>;

    /// Load a project by ID.
    async fn load_project(&self, id: ProjectId) -> Result<Option<Project>>;

    /// List projects matching the filter.
    async fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>>;

    /// Replace a project if it is still in `expected` status at the
    /// revision carried by `project`. Returns the stored record.
    async fn update_project(&self, expected: ProjectStatus, project: &Project) -> Result<Project>;

    // === Problem operations ===

    /// Insert a new problem.
    async fn create_problem(&self, problem: &Problem) -> Result<ProblemId>;

    /// Load a problem by ID.
    async fn load_problem(&self, id: ProblemId) -> Result<Option<Problem>>;

    /// List problems matching the filter.
    async fn list_problems(&self, filter: &ProblemFilter) -> Result<Vec<Problem>>;

    /// Replace a problem if it is still in `expected` status at the
    /// revision carried by `problem`. Returns the stored record.
    async fn update_problem(&self, expected: ProblemStatus, problem: &Problem) -> Result<Problem>;

    // === Snapshots ===

    /// Read every record under a single consistent view.
    async fn snapshot(&self) -> Result<Snapshot>;

    /// Current store revision.
    async fn revision(&self) -> Result<u64>;
}

/// Check a conditional update against the stored record.
pub(crate) fn check_current<S: PartialEq>(
    kind: EntityKind,
    id: impl ToString,
    stored: Option<(S, u64)>,
    expected: S,
    revision: u64,
) -> Result<()> {
    match stored {
        None => Err(StorageError::not_found(kind, id)),
        Some((status, stored_revision)) if status == expected && stored_revision == revision => {
            Ok(())
        }
        Some(_) => Err(StorageError::stale(kind, id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_current_compares_status_and_revision() {
        let id = ProblemId::new();
        assert!(check_current(
            EntityKind::Problem,
            id,
            Some((ProblemStatus::Open, 3)),
            ProblemStatus::Open,
            3
        )
        .is_ok());

        let err = check_current(
            EntityKind::Problem,
            id,
            Some((ProblemStatus::Claimed, 3)),
            ProblemStatus::Open,
            3,
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::Stale { .. }));

        let err = check_current(
            EntityKind::Project,
            id,
            Some((ProjectStatus::Open, 4)),
            ProjectStatus::Open,
            3,
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::Stale { .. }));

        let err = check_current::<ProblemStatus>(EntityKind::Problem, id, None, ProblemStatus::Open, 0)
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }
}
