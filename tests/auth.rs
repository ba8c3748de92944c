mod common;

use std::sync::Arc;
use std::time::Duration;

use mockito::Matcher;
use tokio::task::JoinSet;

use common::*;
use tasksync::auth::{AuthError, GuardStatus, OAuthClient, OAuthConfig, TokenGuard, TokenService};
use tasksync::storage::{LocalStorage, TokenStore};

fn skew() -> chrono::Duration {
    chrono::Duration::minutes(10)
}

#[tokio::test]
async fn test_fresh_token_is_returned_without_refresh() {
    let tokens = Arc::new(FakeTokenService::new());
    let guard = TokenGuard::new(USER, SOURCE, lease_expiring_in(60), skew(), tokens.clone());

    assert_eq!(guard.get_valid_token().await.unwrap(), "access-0");
    assert_eq!(tokens.refreshes(), 0);
}

#[tokio::test]
async fn test_token_inside_skew_is_refreshed() {
    let tokens = Arc::new(FakeTokenService::new());
    let guard = TokenGuard::new(USER, SOURCE, lease_expiring_in(5), skew(), tokens.clone());

    assert_eq!(guard.get_valid_token().await.unwrap(), "access-1");
    assert_eq!(tokens.refreshes(), 1);
    assert!(matches!(guard.status().await, GuardStatus::Connected { .. }));

    // The renewed lease is valid for an hour.
    assert_eq!(guard.get_valid_token().await.unwrap(), "access-1");
    assert_eq!(tokens.refreshes(), 1);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let tokens = Arc::new(FakeTokenService::with_delay(Duration::from_millis(100)));
    let guard = Arc::new(TokenGuard::new(USER, SOURCE, lease_expiring_in(1), skew(), tokens.clone()));

    let mut set = JoinSet::new();
    for _ in 0..8 {
        let guard = guard.clone();
        set.spawn(async move { guard.get_valid_token().await });
    }

    let mut issued = Vec::new();
    while let Some(joined) = set.join_next().await {
        issued.push(joined.unwrap().unwrap());
    }

    assert_eq!(tokens.refreshes(), 1);
    assert!(issued.iter().all(|token| token == "access-1"));
}

#[tokio::test]
async fn test_rejected_refresh_disconnects_and_persists() {
    let storage = LocalStorage::in_memory().await.unwrap();
    storage.save(USER, SOURCE, &lease_expiring_in(1)).await.unwrap();

    let tokens = Arc::new(FakeTokenService::new());
    tokens.set_outcome(RefreshOutcome::Reject);
    let guard = TokenGuard::load(USER, SOURCE, skew(), tokens.clone(), Arc::new(storage.clone()))
        .await
        .unwrap();

    let err = guard.get_valid_token().await.unwrap_err();
    assert!(matches!(err, AuthError::Disconnected));
    assert_eq!(guard.status().await, GuardStatus::Disconnected);
    assert!(storage.load(USER, SOURCE).await.unwrap().is_none());
    assert!(storage.connected_users(SOURCE).await.unwrap().is_empty());

    // No further refresh attempts once disconnected.
    assert!(matches!(guard.get_valid_token().await, Err(AuthError::Disconnected)));
    assert_eq!(tokens.refreshes(), 1);
}

#[tokio::test]
async fn test_transient_refresh_failure_retries_next_time() {
    let tokens = Arc::new(FakeTokenService::new());
    tokens.set_outcome(RefreshOutcome::Unavailable);
    let guard = TokenGuard::new(USER, SOURCE, lease_expiring_in(1), skew(), tokens.clone());

    let err = guard.get_valid_token().await.unwrap_err();
    assert!(matches!(err, AuthError::AuthRequired(_)));
    assert!(matches!(guard.status().await, GuardStatus::Connected { .. }));

    tokens.set_outcome(RefreshOutcome::Grant);
    assert_eq!(guard.get_valid_token().await.unwrap(), "access-2");
}

#[tokio::test]
async fn test_refresh_persists_rotated_lease() {
    let storage = LocalStorage::in_memory().await.unwrap();
    storage.save(USER, SOURCE, &lease_expiring_in(1)).await.unwrap();
    let tokens = Arc::new(FakeTokenService::new());
    let guard = TokenGuard::load(USER, SOURCE, skew(), tokens, Arc::new(storage.clone()))
        .await
        .unwrap();

    guard.get_valid_token().await.unwrap();

    let stored = storage.load(USER, SOURCE).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "access-1");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-0-r1"));
}

#[tokio::test]
async fn test_invalidate_forces_refresh() {
    let tokens = Arc::new(FakeTokenService::new());
    let guard = TokenGuard::new(USER, SOURCE, lease_expiring_in(60), skew(), tokens.clone());

    guard.invalidate().await;

    assert_eq!(guard.get_valid_token().await.unwrap(), "access-1");
    assert_eq!(tokens.refreshes(), 1);
}

#[tokio::test]
async fn test_connect_installs_lease() {
    let storage = LocalStorage::in_memory().await.unwrap();
    let tokens = Arc::new(FakeTokenService::new());
    let guard = TokenGuard::disconnected(USER, SOURCE, skew(), tokens.clone()).with_store(Arc::new(storage.clone()));

    assert!(matches!(guard.get_valid_token().await, Err(AuthError::Disconnected)));
    guard.connect("abc").await.unwrap();

    assert_eq!(guard.get_valid_token().await.unwrap(), "access-from-abc");
    assert_eq!(storage.connected_users(SOURCE).await.unwrap(), vec![USER]);

    let err = guard.connect("bad-code").await.unwrap_err();
    assert!(matches!(err, AuthError::Rejected(_)));
    assert_eq!(guard.get_valid_token().await.unwrap(), "access-from-abc");
}

fn oauth_config(server: &mockito::Server) -> OAuthConfig {
    OAuthConfig {
        client_id: "client-123".to_string(),
        client_secret: None,
        token_url: format!("{}/oauth2/v2.0/token", server.url()),
        redirect_uri: "http://localhost:8400/callback".to_string(),
        scopes: vec!["offline_access".to_string(), "Tasks.ReadWrite".to_string()],
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_oauth_client_refresh_grant() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/oauth2/v2.0/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "rt-1".into()),
            Matcher::UrlEncoded("client_id".into(), "client-123".into()),
            Matcher::UrlEncoded("scope".into(), "offline_access Tasks.ReadWrite".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token_type":"Bearer","access_token":"at-2","refresh_token":"rt-2","expires_in":3599}"#)
        .create_async()
        .await;

    let client = OAuthClient::new(oauth_config(&server)).unwrap();
    let grant = client.refresh("rt-1").await.unwrap();

    mock.assert_async().await;
    assert_eq!(grant.access_token, "at-2");
    assert_eq!(grant.refresh_token.as_deref(), Some("rt-2"));
    assert_eq!(grant.expires_in, 3599);
}

#[tokio::test]
async fn test_oauth_client_code_exchange() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/oauth2/v2.0/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "the-code".into()),
            Matcher::UrlEncoded("redirect_uri".into(), "http://localhost:8400/callback".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"at-1","refresh_token":"rt-1"}"#)
        .create_async()
        .await;

    let client = OAuthClient::new(oauth_config(&server)).unwrap();
    let grant = client.exchange_code("the-code").await.unwrap();

    mock.assert_async().await;
    assert_eq!(grant.access_token, "at-1");
    assert_eq!(grant.expires_in, 3600);
}

#[tokio::test]
async fn test_oauth_client_invalid_grant_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/oauth2/v2.0/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"invalid_grant","error_description":"AADSTS70008: expired"}"#)
        .create_async()
        .await;

    let client = OAuthClient::new(oauth_config(&server)).unwrap();
    let err = client.refresh("rt-old").await.unwrap_err();

    match err {
        AuthError::Rejected(code) => assert_eq!(code, "invalid_grant"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_oauth_client_server_error_is_transient() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/oauth2/v2.0/token")
        .with_status(503)
        .create_async()
        .await;

    let client = OAuthClient::new(oauth_config(&server)).unwrap();
    let err = client.refresh("rt-1").await.unwrap_err();

    assert!(matches!(err, AuthError::Unavailable(_)));
}
