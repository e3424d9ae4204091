//! JSON file storage implementation.
//!
//! Stores one JSON file per record under a `.tally` directory and keeps a
//! store-wide meta marker (revision + updated_at). Records are written to a
//! temporary file and renamed into place, and a single lock serializes
//! writers and snapshot readers, so nobody observes a half-written record.
//!
//! The revision is bumped before the record is written. A failed write
//! may leave a gap in the revision sequence, but a write reported as failed
//! never lands on disk.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tally_core::{
    Category, CategoryId, EntityKind, Problem, ProblemFilter, ProblemId, ProblemStatus, Project,
    ProjectFilter, ProjectId, ProjectStatus, User, UserId,
};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::trait_::check_current;
use super::{Result, Snapshot, Storage, StorageError, UnreadableRecord};

const KINDS: [EntityKind; 4] = [
    EntityKind::User,
    EntityKind::Category,
    EntityKind::Project,
    EntityKind::Problem,
];

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    lock: Mutex<()>,
}

impl JsonStorage {
    /// Create storage rooted at `root`, creating the per-kind directories.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        for kind in KINDS {
            fs::create_dir_all(root.join(dir_name(kind))).await?;
        }
        fs::create_dir_all(root.join("meta")).await?;

        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, kind: EntityKind, id: impl std::fmt::Display) -> PathBuf {
        self.root.join(dir_name(kind)).join(format!("{}.json", id))
    }

    fn meta_path(&self) -> PathBuf {
        self.root.join("meta").join("store.meta.json")
    }

    async fn read_revision(&self) -> Result<u64> {
        match fs::read_to_string(self.meta_path()).await {
            Ok(s) => {
                let json: serde_json::Value = serde_json::from_str(&s)?;
                Ok(json.get("revision").and_then(|v| v.as_u64()).unwrap_or(0))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and increment the store revision, return the new value.
    async fn bump_revision(&self) -> Result<u64> {
        let revision = self.read_revision().await? + 1;
        let meta = serde_json::json!({"revision": revision, "updated_at": chrono::Utc::now()});
        write_json(&self.meta_path(), &meta).await?;
        Ok(revision)
    }

    async fn insert<T: Serialize>(
        &self,
        kind: EntityKind,
        id: impl std::fmt::Display,
        record: &T,
    ) -> Result<()> {
        let path = self.record_path(kind, &id);
        if fs::try_exists(&path).await? {
            return Err(StorageError::Conflict(format!("{} id {} exists", kind, id)));
        }
        self.bump_revision().await?;
        write_json(&path, record).await
    }

    async fn replace<T: Serialize>(
        &self,
        kind: EntityKind,
        id: impl std::fmt::Display,
        record: &T,
    ) -> Result<()> {
        let path = self.record_path(kind, &id);
        if !fs::try_exists(&path).await? {
            return Err(StorageError::not_found(kind, id));
        }
        self.bump_revision().await?;
        write_json(&path, record).await
    }

    async fn list_all<T: DeserializeOwned>(&self, kind: EntityKind) -> Result<Vec<T>> {
        let (items, _) = self.list_checked(kind).await?;
        Ok(items)
    }

    async fn list_checked<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
    ) -> Result<(Vec<T>, Vec<UnreadableRecord>)> {
        list_dir(kind, &self.root.join(dir_name(kind))).await
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn create_user(&self, user: &User) -> Result<UserId> {
        let _guard = self.lock.lock().await;
        let users: Vec<User> = self.list_all(EntityKind::User).await?;
        if users.iter().any(|u| u.name == user.name) {
            return Err(StorageError::Conflict(format!("user name '{}' is taken", user.name)));
        }
        self.insert(EntityKind::User, user.id, user).await?;
        Ok(user.id)
    }

    async fn load_user(&self, id: UserId) -> Result<Option<User>> {
        read_json(&self.record_path(EntityKind::User, id)).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.list_all(EntityKind::User).await
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let _guard = self.lock.lock().await;
        let users: Vec<User> = self.list_all(EntityKind::User).await?;
        if users.iter().any(|u| u.id != user.id && u.name == user.name) {
            return Err(StorageError::Conflict(format!("user name '{}' is taken", user.name)));
        }
        self.replace(EntityKind::User, user.id, user).await
    }

    async fn create_category(&self, category: &Category) -> Result<CategoryId> {
        let _guard = self.lock.lock().await;
        let categories: Vec<Category> = self.list_all(EntityKind::Category).await?;
        if categories.iter().any(|c| c.name == category.name) {
            return Err(StorageError::Conflict(format!(
                "category name '{}' is taken",
                category.name
            )));
        }
        self.insert(EntityKind::Category, category.id, category).await?;
        Ok(category.id)
    }

    async fn load_category(&self, id: CategoryId) -> Result<Option<Category>> {
        read_json(&self.record_path(EntityKind::Category, id)).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        self.list_all(EntityKind::Category).await
    }

    async fn update_category(&self, category: &Category) -> Result<()> {
        let _guard = self.lock.lock().await;
        let categories: Vec<Category> = self.list_all(EntityKind::Category).await?;
        if categories
            .iter()
            .any(|c| c.id != category.id && c.name == category.name)
        {
            return Err(StorageError::Conflict(format!(
                "category name '{}' is taken",
                category.name
            )));
        }
        self.replace(EntityKind::Category, category.id, category).await
    }

    async fn create_project(&self, project: &Project) -> Result<ProjectId> {
        let _guard = self.lock.lock().await;
        self.insert(EntityKind::Project, project.id, project).await?;
        Ok(project.id)
    }

    async fn load_project(&self, id: ProjectId) -> Result<Option<Project>> {
        read_json(&self.record_path(EntityKind::Project, id)).await
    }

    async fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>> {
        let all: Vec<Project> = self.list_all(EntityKind::Project).await?;
        Ok(all.into_iter().filter(|p| filter.matches(p)).collect())
    }

    async fn update_project(&self, expected: ProjectStatus, project: &Project) -> Result<Project> {
        let _guard = self.lock.lock().await;
        let path = self.record_path(EntityKind::Project, project.id);
        let stored: Option<Project> = read_json(&path).await?;
        check_current(
            EntityKind::Project,
            project.id,
            stored.as_ref().map(|p| (p.status, p.revision)),
            expected,
            project.revision,
        )?;

        let mut next = project.clone();
        next.revision += 1;
        let revision = self.bump_revision().await?;
        write_json(&path, &next).await?;
        debug!(project = %next.id, store_revision = revision, "project updated");
        Ok(next)
    }

    async fn create_problem(&self, problem: &Problem) -> Result<ProblemId> {
        let _guard = self.lock.lock().await;
        self.insert(EntityKind::Problem, problem.id, problem).await?;
        Ok(problem.id)
    }

    async fn load_problem(&self, id: ProblemId) -> Result<Option<Problem>> {
        read_json(&self.record_path(EntityKind::Problem, id)).await
    }

    async fn list_problems(&self, filter: &ProblemFilter) -> Result<Vec<Problem>> {
        let all: Vec<Problem> = self.list_all(EntityKind::Problem).await?;
        Ok(all.into_iter().filter(|p| filter.matches(p)).collect())
    }

    async fn update_problem(&self, expected: ProblemStatus, problem: &Problem) -> Result<Problem> {
        let _guard = self.lock.lock().await;
        let path = self.record_path(EntityKind::Problem, problem.id);
        let stored: Option<Problem> = read_json(&path).await?;
        check_current(
            EntityKind::Problem,
            problem.id,
            stored.as_ref().map(|p| (p.status, p.revision)),
            expected,
            problem.revision,
        )?;

        let mut next = problem.clone();
        next.revision += 1;
        let revision = self.bump_revision().await?;
        write_json(&path, &next).await?;
        debug!(problem = %next.id, store_revision = revision, "problem updated");
        Ok(next)
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let _guard = self.lock.lock().await;
        let (mut users, mut unreadable) = self.list_checked::<User>(EntityKind::User).await?;
        let (mut categories, skipped) = self.list_checked::<Category>(EntityKind::Category).await?;
        unreadable.extend(skipped);
        let (mut projects, skipped) = self.list_checked::<Project>(EntityKind::Project).await?;
        unreadable.extend(skipped);
        let (mut problems, skipped) = self.list_checked::<Problem>(EntityKind::Problem).await?;
        unreadable.extend(skipped);
        users.sort_by_key(|u| u.id);
        categories.sort_by_key(|c| c.id);
        projects.sort_by_key(|p| p.id);
        problems.sort_by_key(|p| p.id);

        Ok(Snapshot {
            revision: self.read_revision().await?,
            users,
            categories,
            projects,
            problems,
            unreadable,
        })
    }

    async fn revision(&self) -> Result<u64> {
        let _guard = self.lock.lock().await;
        self.read_revision().await
    }
}

fn dir_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::User => "users",
        EntityKind::Category => "categories",
        EntityKind::Project => "projects",
        EntityKind::Problem => "problems",
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json.as_bytes()).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: DeserializeOwned>(
    kind: EntityKind,
    dir: &Path,
) -> Result<(Vec<T>, Vec<UnreadableRecord>)> {
    let mut items = Vec::new();
    let mut unreadable = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        match read_json(&path).await {
            Ok(Some(item)) => items.push(item),
            Ok(None) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable record");
                unreadable.push(UnreadableRecord {
                    kind,
                    id: path
                        .file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    reason: e.to_string(),
                });
            }
        }
    }
    unreadable.sort_by(|a, b| a.id.cmp(&b.id));
    Ok((items, unreadable))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::PlannedDuration;

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let user = User::new("grace");
        {
            let storage = JsonStorage::new(dir.path()).await.unwrap();
            storage.create_user(&user).await.unwrap();
        }

        let storage = JsonStorage::new(dir.path()).await.unwrap();
        let loaded = storage.load_user(user.id).await.unwrap().unwrap();
        assert_eq!(loaded, user);
        assert_eq!(storage.revision().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_category_name() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        storage.create_category(&Category::new("Bug", 5)).await.unwrap();

        let err = storage
            .create_category(&Category::new("Bug", 8))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_conditional_problem_update() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        let problem = Problem::new("Flaky test", "", CategoryId::new(), None);
        storage.create_problem(&problem).await.unwrap();

        let mut claimed = problem.clone();
        claimed.status = ProblemStatus::Claimed;
        claimed.assignee = Some(UserId::new());
        claimed.claimed_at = Some(chrono::Utc::now());
        let stored = storage
            .update_problem(ProblemStatus::Open, &claimed)
            .await
            .unwrap();
        assert_eq!(stored.revision, 1);

        // Replaying the same write is stale now.
        let err = storage
            .update_problem(ProblemStatus::Open, &claimed)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Stale { .. }));
    }

    #[tokio::test]
    async fn test_list_filters_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();

        let mut archived = Project::new("Old", "", PlannedDuration::OneWeek);
        archived.archived_at = Some(chrono::Utc::now());
        storage.create_project(&archived).await.unwrap();
        storage
            .create_project(&Project::new("New", "", PlannedDuration::TwoWeeks))
            .await
            .unwrap();

        let visible = storage.list_projects(&ProjectFilter::default()).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].name, "New");

        let snapshot = storage.snapshot().await.unwrap();
        assert_eq!(snapshot.projects.len(), 2);
        assert_eq!(snapshot.revision, 2);
    }

    #[tokio::test]
    async fn test_failed_revision_bump_leaves_record_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        let problem = Problem::new("Disk full", "", CategoryId::new(), None);
        storage.create_problem(&problem).await.unwrap();

        // A directory where the meta file should be makes the bump fail.
        let meta = dir.path().join("meta").join("store.meta.json");
        std::fs::remove_file(&meta).unwrap();
        std::fs::create_dir(&meta).unwrap();

        let mut claimed = problem.clone();
        claimed.status = ProblemStatus::Claimed;
        claimed.assignee = Some(UserId::new());
        claimed.claimed_at = Some(chrono::Utc::now());
        assert!(storage
            .update_problem(ProblemStatus::Open, &claimed)
            .await
            .is_err());

        let stored = storage.load_problem(problem.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ProblemStatus::Open);
        assert_eq!(stored.revision, 0);
    }

    #[tokio::test]
    async fn test_snapshot_reports_unreadable_records() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        let problem = Problem::new("Readable", "", CategoryId::new(), None);
        storage.create_problem(&problem).await.unwrap();

        let broken = ProblemId::new();
        std::fs::write(
            dir.path().join("problems").join(format!("{}.json", broken)),
            "{ not json",
        )
        .unwrap();

        assert_eq!(
            storage
                .list_problems(&ProblemFilter::default())
                .await
                .unwrap()
                .len(),
            1
        );

        let snapshot = storage.snapshot().await.unwrap();
        assert_eq!(snapshot.problems.len(), 1);
        assert_eq!(snapshot.unreadable.len(), 1);
        assert_eq!(snapshot.unreadable[0].kind, EntityKind::Problem);
        assert_eq!(snapshot.unreadable[0].id, broken.to_string());
    }

    #[tokio::test]
    async fn test_update_missing_project_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        let project = Project::new("Ghost", "", PlannedDuration::OneWeek);

        let err = storage
            .update_project(ProjectStatus::Open, &project)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }
}
