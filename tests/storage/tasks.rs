use chrono::{Duration, Utc};

use tasksync::entities::{TaskPriority, TaskStatus};
use tasksync::storage::{LocalStorage, NewTask, TaskPatch, TaskStore};

const SOURCE: &str = "microsoft_todo";

fn bound(user_id: i64, name: &str, external_id: &str) -> NewTask {
    NewTask {
        external_id: Some(external_id.to_string()),
        external_source: Some(SOURCE.to_string()),
        external_list_id: Some("list-1".to_string()),
        external_last_modified: Some(Utc::now()),
        ..NewTask::local(user_id, name)
    }
}

#[tokio::test]
async fn test_create_and_get_task() {
    let storage = LocalStorage::in_memory().await.unwrap();

    let created = TaskStore::create(&storage, NewTask::local(1, "Buy milk")).await.unwrap();
    assert_eq!(created.status, TaskStatus::NotStarted);
    assert_eq!(created.priority, TaskPriority::Medium);
    assert!(created.updated_at.is_some());

    let fetched = TaskStore::get(&storage, created.id).await.unwrap().unwrap();
    assert_eq!(fetched, created);
    assert!(TaskStore::get(&storage, created.id + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn test_explicit_stamp_is_kept() {
    let storage = LocalStorage::in_memory().await.unwrap();
    let stamp = Utc::now() - Duration::days(3);

    let created = TaskStore::create(
        &storage,
        NewTask {
            updated_at: Some(stamp),
            external_last_modified: Some(stamp),
            ..NewTask::local(1, "Imported")
        },
    )
    .await
    .unwrap();

    assert_eq!(created.updated_at, Some(stamp));
    assert_eq!(created.external_last_modified, Some(stamp));
}

#[tokio::test]
async fn test_find_by_external_id_is_scoped() {
    let storage = LocalStorage::in_memory().await.unwrap();
    let mine = TaskStore::create(&storage, bound(1, "Mine", "ext-1")).await.unwrap();
    TaskStore::create(&storage, bound(2, "Theirs", "ext-1")).await.unwrap();

    let found = storage.find_by_external_id(1, SOURCE, "ext-1").await.unwrap().unwrap();
    assert_eq!(found.id, mine.id);
    assert!(storage.find_by_external_id(1, "other_source", "ext-1").await.unwrap().is_none());
    assert!(storage.find_by_external_id(3, SOURCE, "ext-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_binding_is_unique_per_user() {
    let storage = LocalStorage::in_memory().await.unwrap();
    TaskStore::create(&storage, bound(1, "First", "ext-1")).await.unwrap();

    let duplicate = TaskStore::create(&storage, bound(1, "Second", "ext-1")).await;
    assert!(duplicate.is_err());
}

#[tokio::test]
async fn test_update_refuses_rebinding() {
    let storage = LocalStorage::in_memory().await.unwrap();
    let task = TaskStore::create(&storage, bound(1, "Bound", "ext-1")).await.unwrap();

    let rebind = storage
        .update(
            task.id,
            TaskPatch {
                external_id: Some("ext-2".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(rebind.is_err());

    // Restating the same binding is fine.
    let same = storage
        .update(
            task.id,
            TaskPatch {
                external_id: Some("ext-1".to_string()),
                name: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(same.name, "Renamed");
}

#[tokio::test]
async fn test_update_touches_only_patched_columns() {
    let storage = LocalStorage::in_memory().await.unwrap();
    let due = Utc::now() + Duration::days(1);
    let task = TaskStore::create(
        &storage,
        NewTask {
            note: Some("Keep me".to_string()),
            due_date: Some(due),
            ..NewTask::local(1, "Edit me")
        },
    )
    .await
    .unwrap();

    let updated = storage
        .update(
            task.id,
            TaskPatch {
                status: Some(TaskStatus::Done),
                due_date: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.status, TaskStatus::Done);
    assert_eq!(updated.due_date, None);
    assert_eq!(updated.note.as_deref(), Some("Keep me"));
    assert!(updated.updated_at >= task.updated_at);
}

#[tokio::test]
async fn test_update_missing_task_fails() {
    let storage = LocalStorage::in_memory().await.unwrap();
    assert!(storage.update(42, TaskPatch::default()).await.is_err());
}

#[tokio::test]
async fn test_export_candidates() {
    let storage = LocalStorage::in_memory().await.unwrap();
    let synced = TaskStore::create(&storage, bound(1, "Synced", "ext-1")).await.unwrap();
    let local = TaskStore::create(&storage, NewTask::local(1, "Local")).await.unwrap();
    TaskStore::create(
        &storage,
        NewTask {
            external_id: Some("g-1".to_string()),
            external_source: Some("google_tasks".to_string()),
            ..NewTask::local(1, "Elsewhere")
        },
    )
    .await
    .unwrap();
    TaskStore::create(&storage, bound(2, "Other user", "ext-9")).await.unwrap();

    let ids = |tasks: Vec<tasksync::task::Model>| tasks.into_iter().map(|t| t.id).collect::<Vec<_>>();

    let bound_only = storage.list_export_candidates(1, SOURCE, false).await.unwrap();
    assert_eq!(ids(bound_only), vec![synced.id]);

    let with_unbound = storage.list_export_candidates(1, SOURCE, true).await.unwrap();
    assert_eq!(ids(with_unbound), vec![synced.id, local.id]);
}
