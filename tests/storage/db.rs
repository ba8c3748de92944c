use tasksync::storage::{LocalStorage, NewTask, TaskStore};

#[tokio::test]
async fn test_local_storage_creation() {
    // In-memory database for tests
    let result = LocalStorage::in_memory().await;
    assert!(result.is_ok(), "LocalStorage should be created successfully");
}

#[tokio::test]
async fn test_file_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("tasks.db").display());

    {
        let storage = LocalStorage::new(&url).await.unwrap();
        TaskStore::create(&storage, NewTask::local(1, "Persisted")).await.unwrap();
    }

    // Opening again must not fail on the existing schema.
    let storage = LocalStorage::new(&url).await.unwrap();
    let tasks = storage.tasks_for_user(1).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].name, "Persisted");
}
