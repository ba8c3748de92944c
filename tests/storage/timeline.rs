use serde_json::json;

use tasksync::storage::{LocalStorage, NewChangeEvent, NewTask, TaskStore, TimelineSink};

fn event(task_id: i64, field: &str, new_value: &str) -> NewChangeEvent {
    NewChangeEvent {
        task_id,
        user_id: 1,
        field: field.to_string(),
        old_value: None,
        new_value: Some(new_value.to_string()),
        actor: "sync:microsoft_todo".to_string(),
        metadata: json!({ "source": "microsoft_todo", "action": "import" }),
    }
}

#[tokio::test]
async fn test_record_appends_in_order() {
    let storage = LocalStorage::in_memory().await.unwrap();
    let task = TaskStore::create(&storage, NewTask::local(1, "Tracked")).await.unwrap();

    storage
        .record(vec![event(task.id, "name", "Tracked"), event(task.id, "status", "done")])
        .await
        .unwrap();
    storage.record(vec![event(task.id, "priority", "high")]).await.unwrap();

    let events = storage.timeline_for_task(task.id).await.unwrap();
    let fields: Vec<&str> = events.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["name", "status", "priority"]);
    assert_eq!(events[0].metadata["action"], "import");
    assert_eq!(events[0].actor, "sync:microsoft_todo");
}

#[tokio::test]
async fn test_empty_batch_is_a_no_op() {
    let storage = LocalStorage::in_memory().await.unwrap();
    storage.record(Vec::new()).await.unwrap();
    assert!(storage.timeline_for_user(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_timeline_for_user_spans_tasks() {
    let storage = LocalStorage::in_memory().await.unwrap();
    let a = TaskStore::create(&storage, NewTask::local(1, "A")).await.unwrap();
    let b = TaskStore::create(&storage, NewTask::local(1, "B")).await.unwrap();
    let other = TaskStore::create(&storage, NewTask::local(2, "C")).await.unwrap();

    storage
        .record(vec![event(a.id, "name", "A"), event(b.id, "name", "B")])
        .await
        .unwrap();
    storage
        .record(vec![NewChangeEvent {
            user_id: 2,
            ..event(other.id, "name", "C")
        }])
        .await
        .unwrap();

    assert_eq!(storage.timeline_for_user(1).await.unwrap().len(), 2);
    assert_eq!(storage.timeline_for_user(2).await.unwrap().len(), 1);
}
