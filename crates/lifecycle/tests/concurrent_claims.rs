//! Racing claims on the same problem.

use std::sync::Arc;

use tally_core::{ProblemStatus, UserId};
use tally_lifecycle::{LifecycleController, LifecycleError, ProblemSpec};
use tally_storage::{JsonStorage, MemoryStorage, Storage};

async fn race<S: Storage + 'static>(controller: Arc<LifecycleController<S>>) {
    let category = controller.add_category("Feature", 3).await.unwrap();
    let problem = controller
        .create_problem(ProblemSpec {
            title: "Contended".to_string(),
            description: String::new(),
            category_id: category.id,
            project_id: None,
        })
        .await
        .unwrap();

    let problem_id = problem.id;

    let mut users: Vec<UserId> = Vec::new();
    for i in 0..8 {
        users.push(controller.register_user(&format!("user-{i}")).await.unwrap().id);
    }

    let handles: Vec<_> = users
        .iter()
        .map(|user| {
            let controller = Arc::clone(&controller);
            let user = *user;
            tokio::spawn(async move { controller.claim(problem_id, user).await })
        })
        .collect();

    let mut winners = Vec::new();
    for (user, handle) in users.iter().zip(handles) {
        match handle.await.unwrap() {
            Ok(_) => winners.push(*user),
            Err(LifecycleError::InvalidTransition(_)) | Err(LifecycleError::StaleState { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners.len(), 1);
    let stored = controller.get_problem(problem_id).await.unwrap();
    assert_eq!(stored.status, ProblemStatus::Claimed);
    assert_eq!(stored.assignee, Some(winners[0]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exactly_one_claim_wins_in_memory() {
    let controller = Arc::new(LifecycleController::new(Arc::new(MemoryStorage::new())));
    race(controller).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exactly_one_claim_wins_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonStorage::new(dir.path()).await.unwrap();
    let controller = Arc::new(LifecycleController::new(Arc::new(storage)));
    race(controller).await;
}
