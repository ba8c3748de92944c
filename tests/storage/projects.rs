use tasksync::storage::{LocalStorage, ProjectStore};

#[tokio::test]
async fn test_create_and_list_projects() {
    let storage = LocalStorage::in_memory().await.unwrap();

    let work = ProjectStore::create(&storage, 1, "Work", Some("microsoft_todo")).await.unwrap();
    let home = ProjectStore::create(&storage, 1, "Home", None).await.unwrap();
    ProjectStore::create(&storage, 2, "Work", None).await.unwrap();

    assert_eq!(work.source.as_deref(), Some("microsoft_todo"));
    assert!(home.source.is_none());

    let projects = storage.projects_for_user(1).await.unwrap();
    let ids: Vec<i64> = projects.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![work.id, home.id]);

    let fetched = ProjectStore::get(&storage, work.id).await.unwrap().unwrap();
    assert_eq!(fetched.name, "Work");
}

#[tokio::test]
async fn test_find_by_name_ignores_case() {
    let storage = LocalStorage::in_memory().await.unwrap();
    let first = ProjectStore::create(&storage, 1, "Einkäufe", None).await.unwrap();
    let second = ProjectStore::create(&storage, 1, "EINKÄUFE", None).await.unwrap();
    ProjectStore::create(&storage, 1, "Errands", None).await.unwrap();

    let matches = storage.find_by_name_case_insensitive(1, "einkäufe").await.unwrap();
    let ids: Vec<i64> = matches.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);

    assert!(storage.find_by_name_case_insensitive(2, "einkäufe").await.unwrap().is_empty());
}
