use chrono::{Duration, Utc};

use tasksync::auth::TokenLease;
use tasksync::storage::{LocalStorage, TokenStore};

const PROVIDER: &str = "microsoft_todo";

fn lease(access: &str, refresh: &str) -> TokenLease {
    TokenLease {
        access_token: access.to_string(),
        refresh_token: Some(refresh.to_string()),
        expires_at: Utc::now() + Duration::hours(1),
    }
}

#[tokio::test]
async fn test_save_and_load_lease() {
    let storage = LocalStorage::in_memory().await.unwrap();
    assert!(storage.load(1, PROVIDER).await.unwrap().is_none());

    let original = lease("at-1", "rt-1");
    storage.save(1, PROVIDER, &original).await.unwrap();
    assert_eq!(storage.load(1, PROVIDER).await.unwrap(), Some(original));

    // Saving again replaces the row.
    let rotated = lease("at-2", "rt-2");
    storage.save(1, PROVIDER, &rotated).await.unwrap();
    assert_eq!(storage.load(1, PROVIDER).await.unwrap(), Some(rotated));
    assert_eq!(storage.connected_users(PROVIDER).await.unwrap(), vec![1]);
}

#[tokio::test]
async fn test_lease_without_access_token_still_loads() {
    let storage = LocalStorage::in_memory().await.unwrap();
    storage.save(1, PROVIDER, &lease("", "rt-1")).await.unwrap();

    let loaded = storage.load(1, PROVIDER).await.unwrap().unwrap();
    assert!(loaded.access_token.is_empty());
    assert_eq!(loaded.refresh_token.as_deref(), Some("rt-1"));
}

#[tokio::test]
async fn test_mark_disconnected() {
    let storage = LocalStorage::in_memory().await.unwrap();
    storage.save(1, PROVIDER, &lease("at-1", "rt-1")).await.unwrap();
    storage.save(2, PROVIDER, &lease("at-2", "rt-2")).await.unwrap();

    storage.mark_disconnected(1, PROVIDER).await.unwrap();

    assert!(storage.load(1, PROVIDER).await.unwrap().is_none());
    assert_eq!(storage.connected_users(PROVIDER).await.unwrap(), vec![2]);

    // Reconnecting restores the user.
    storage.save(1, PROVIDER, &lease("at-3", "rt-3")).await.unwrap();
    assert_eq!(storage.connected_users(PROVIDER).await.unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn test_leases_are_per_provider() {
    let storage = LocalStorage::in_memory().await.unwrap();
    storage.save(1, PROVIDER, &lease("at-1", "rt-1")).await.unwrap();

    assert!(storage.load(1, "google_tasks").await.unwrap().is_none());
    assert!(storage.connected_users("google_tasks").await.unwrap().is_empty());
}
