//! ProjectStore interface tests.
//!
//! These tests verify the contract of the ProjectStore trait.
//! Each storage implementation should run these tests. Every test uses its
//! own user ids so a shared database does not leak between tests.

use std::collections::BTreeSet;

use todo_sv::model::{new_id, NewTask, Project, Task, Version};
use todo_sv::storage::{ProjectStore, StorageError};

/// User ids unique to one test run.
fn users(n: usize) -> Vec<String> {
    let run = new_id();
    (1..=n).map(|i| format!("test_{}_{}", run, i)).collect()
}

fn make_project(owner: &str, participants: &[&str]) -> Project {
    Project::new("test project", owner, participants.iter().copied())
}

// =============================================================================
// insert / by_id tests
// =============================================================================

pub async fn test_insert_and_get<S: ProjectStore>(store: &S) {
    let u = users(3);
    let project = make_project(&u[0], &[&u[1], &u[2]]);

    store.insert(&project).await.expect("insert should succeed");

    let loaded = store.by_id(&project.id).await.expect("by_id should succeed");
    assert_eq!(loaded, project);
}

pub async fn test_get_nonexistent<S: ProjectStore>(store: &S) {
    let result = store.by_id(&new_id()).await;
    assert!(
        matches!(result, Err(StorageError::NotFound { .. })),
        "missing project should be NotFound, got {:?}",
        result
    );
}

pub async fn test_insert_duplicate<S: ProjectStore>(store: &S) {
    let u = users(2);
    let first = make_project(&u[0], &[&u[1]]);
    store.insert(&first).await.expect("first insert should succeed");

    let mut second = make_project(&u[1], &[]);
    second.id = first.id.clone();
    second.name = "impostor".to_string();

    let result = store.insert(&second).await;
    assert!(
        matches!(result, Err(StorageError::AlreadyExists { .. })),
        "duplicate id should be AlreadyExists, got {:?}",
        result
    );

    let stored = store.by_id(&first.id).await.expect("by_id should succeed");
    assert_eq!(stored, first, "first project must be kept");
}

pub async fn test_insert_preserves_tasks<S: ProjectStore>(store: &S) {
    let u = users(1);
    let task = Task::new(NewTask {
        title: "task".to_string(),
        description: "details".to_string(),
        tags: ["a".to_string(), "b".to_string()].into_iter().collect(),
        is_important: true,
    });
    let project = make_project(&u[0], &[]).with_task(task.clone());

    store.insert(&project).await.expect("insert should succeed");

    let loaded = store.by_id(&project.id).await.expect("by_id should succeed");
    assert_eq!(loaded.task(&task.id), Some(&task));
}

// =============================================================================
// replace tests
// =============================================================================

pub async fn test_replace_bumps_version<S: ProjectStore>(store: &S) {
    let u = users(2);
    let project = make_project(&u[0], &[&u[1]]);
    store.insert(&project).await.expect("insert should succeed");

    let next = project.with_name("renamed");
    store
        .replace(&project, &next)
        .await
        .expect("replace should succeed");

    let loaded = store.by_id(&project.id).await.expect("by_id should succeed");
    assert_eq!(loaded, next, "stored document should be next verbatim");
    assert!(loaded.version > project.version, "version must increase");
}

pub async fn test_replace_stale_version<S: ProjectStore>(store: &S) {
    let u = users(1);
    let original = make_project(&u[0], &[]);
    store.insert(&original).await.expect("insert should succeed");

    let first = original.with_name("first");
    store
        .replace(&original, &first)
        .await
        .expect("first replace should succeed");

    // Second writer still holds the original version
    let result = store.replace(&original, &original.with_name("second")).await;
    assert!(
        matches!(result, Err(StorageError::VersionMismatch { .. })),
        "stale version should be VersionMismatch, got {:?}",
        result
    );

    let loaded = store.by_id(&original.id).await.expect("by_id should succeed");
    assert_eq!(loaded.name, "first");
}

pub async fn test_replace_unknown_version<S: ProjectStore>(store: &S) {
    let u = users(1);
    let original = make_project(&u[0], &[]);
    store.insert(&original).await.expect("insert should succeed");

    let mut forged = original.clone();
    forged.version = Version::generate();

    let result = store.replace(&forged, &forged.with_name("x")).await;
    assert!(
        matches!(result, Err(StorageError::VersionMismatch { .. })),
        "never-seen version should be VersionMismatch, got {:?}",
        result
    );
}

pub async fn test_replace_ids_mismatch<S: ProjectStore>(store: &S) {
    let u = users(1);
    let a = make_project(&u[0], &[]);
    let b = make_project(&u[0], &[]);

    // Neither exists yet
    let result = store.replace(&a, &b).await;
    assert!(
        matches!(result, Err(StorageError::IdsMismatch { .. })),
        "different ids should be IdsMismatch, got {:?}",
        result
    );

    // Both exist
    store.insert(&a).await.expect("insert should succeed");
    store.insert(&b).await.expect("insert should succeed");
    let result = store.replace(&a, &b).await;
    assert!(matches!(result, Err(StorageError::IdsMismatch { .. })));
}

pub async fn test_replace_nonexistent<S: ProjectStore>(store: &S) {
    let u = users(1);
    let project = make_project(&u[0], &[]);

    let result = store.replace(&project, &project.with_name("x")).await;
    assert!(
        matches!(result, Err(StorageError::NotFound { .. })),
        "missing project should be NotFound, got {:?}",
        result
    );
}

pub async fn test_concurrent_replace_single_winner<S: ProjectStore>(store: &S) {
    let u = users(1);
    let original = make_project(&u[0], &[]);
    store.insert(&original).await.expect("insert should succeed");

    let candidates: Vec<Project> = (0..8)
        .map(|i| original.with_name(format!("writer-{}", i)))
        .collect();
    let results = futures::future::join_all(
        candidates
            .iter()
            .map(|next| store.replace(&original, next)),
    )
    .await;

    let wins = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(StorageError::VersionMismatch { .. })))
        .count();
    assert_eq!(wins, 1, "exactly one writer should win");
    assert_eq!(conflicts, 7, "every other writer should conflict");
}

// =============================================================================
// by_participant tests
// =============================================================================

pub async fn test_by_participant_membership<S: ProjectStore>(store: &S) {
    let u = users(4);
    // A: owner 1, participants {2, 3}; B: owner 2, participants {3}
    let a = make_project(&u[0], &[&u[1], &u[2]]);
    let b = make_project(&u[1], &[&u[2]]);
    store.insert(&a).await.expect("insert should succeed");
    store.insert(&b).await.expect("insert should succeed");

    let ids = |projects: Vec<Project>| -> BTreeSet<String> {
        projects.into_iter().map(|p| p.id).collect()
    };

    let for_3 = ids(store.by_participant(&u[2]).await.expect("query should succeed"));
    assert_eq!(for_3, [a.id.clone(), b.id.clone()].into_iter().collect());

    let for_1 = ids(store.by_participant(&u[0]).await.expect("query should succeed"));
    assert_eq!(for_1, [a.id.clone()].into_iter().collect());

    let for_2 = ids(store.by_participant(&u[1]).await.expect("query should succeed"));
    assert_eq!(for_2, [a.id, b.id].into_iter().collect());

    let for_4 = store.by_participant(&u[3]).await.expect("query should succeed");
    assert!(for_4.is_empty());
}

// =============================================================================
// delete tests
// =============================================================================

pub async fn test_delete<S: ProjectStore>(store: &S) {
    let u = users(1);
    let project = make_project(&u[0], &[]);
    store.insert(&project).await.expect("insert should succeed");

    store.delete(&project.id).await.expect("delete should succeed");

    let result = store.by_id(&project.id).await;
    assert!(matches!(result, Err(StorageError::NotFound { .. })));
}

pub async fn test_delete_nonexistent<S: ProjectStore>(store: &S) {
    let id = new_id();
    store
        .delete(&id)
        .await
        .expect("deleting a missing project should succeed");

    let result = store.by_id(&id).await;
    assert!(matches!(result, Err(StorageError::NotFound { .. })));
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all ProjectStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_project_store_tests {
    ($store:expr) => {
        use $crate::storage::project_store_tests::*;

        // insert / by_id tests
        test_insert_and_get($store).await;
        println!("  test_insert_and_get: PASSED");

        test_get_nonexistent($store).await;
        println!("  test_get_nonexistent: PASSED");

        test_insert_duplicate($store).await;
        println!("  test_insert_duplicate: PASSED");

        test_insert_preserves_tasks($store).await;
        println!("  test_insert_preserves_tasks: PASSED");

        // replace tests
        test_replace_bumps_version($store).await;
        println!("  test_replace_bumps_version: PASSED");

        test_replace_stale_version($store).await;
        println!("  test_replace_stale_version: PASSED");

        test_replace_unknown_version($store).await;
        println!("  test_replace_unknown_version: PASSED");

        test_replace_ids_mismatch($store).await;
        println!("  test_replace_ids_mismatch: PASSED");

        test_replace_nonexistent($store).await;
        println!("  test_replace_nonexistent: PASSED");

        test_concurrent_replace_single_winner($store).await;
        println!("  test_concurrent_replace_single_winner: PASSED");

        // by_participant tests
        test_by_participant_membership($store).await;
        println!("  test_by_participant_membership: PASSED");

        // delete tests
        test_delete($store).await;
        println!("  test_delete: PASSED");

        test_delete_nonexistent($store).await;
        println!("  test_delete_nonexistent: PASSED");
    };
}
