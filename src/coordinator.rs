use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{error, info, warn};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::auth::{AuthError, GuardStatus, TokenGuard, TokenService};
use crate::error::SyncError;
use crate::storage::TokenStore;
use crate::sync::{SyncResult, SyncService};

/// Which direction a coordinated pass runs in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassMode {
    Import,
    Export,
    Bidirectional,
}

/// Coordinates sync passes across all connected users
#[derive(Clone)]
pub struct SyncCoordinator {
    service: SyncService,
    tokens: Arc<dyn TokenService>,
    token_store: Arc<dyn TokenStore>,
    provider: String,
    skew: chrono::Duration,
    limit: Arc<Semaphore>,
    guards: Arc<Mutex<HashMap<i64, Arc<TokenGuard>>>>,
}

impl SyncCoordinator {
    /// Create a new sync coordinator running at most `max_concurrent` passes at once
    pub fn new(
        service: SyncService,
        tokens: Arc<dyn TokenService>,
        token_store: Arc<dyn TokenStore>,
        provider: impl Into<String>,
        skew: chrono::Duration,
        max_concurrent: usize,
    ) -> Self {
        Self {
            service,
            tokens,
            token_store,
            provider: provider.into(),
            skew,
            limit: Arc::new(Semaphore::new(max_concurrent.max(1))),
            guards: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Token guard of a user, kept across rounds. Disconnected guards are
    /// reloaded so a reconnect made elsewhere is picked up.
    pub async fn guard(&self, user_id: i64) -> Result<Arc<TokenGuard>> {
        let mut guards = self.guards.lock().await;
        if let Some(guard) = guards.get(&user_id) {
            if guard.status().await != GuardStatus::Disconnected {
                return Ok(guard.clone());
            }
        }

        let guard = Arc::new(
            TokenGuard::load(
                user_id,
                self.provider.clone(),
                self.skew,
                self.tokens.clone(),
                self.token_store.clone(),
            )
            .await?,
        );
        guards.insert(user_id, guard.clone());
        Ok(guard)
    }

    /// Exchange an authorization code for `user_id` and persist the lease
    pub async fn connect(&self, user_id: i64, code: &str) -> Result<(), AuthError> {
        let guard = TokenGuard::disconnected(user_id, self.provider.clone(), self.skew, self.tokens.clone())
            .with_store(self.token_store.clone());
        guard.connect(code).await?;
        self.guards.lock().await.insert(user_id, Arc::new(guard));
        Ok(())
    }

    /// Run one pass for a single user
    pub async fn sync_user(&self, user_id: i64, mode: PassMode, force: bool) -> Result<SyncResult, SyncError> {
        let guard = self.guard(user_id).await?;
        match mode {
            PassMode::Import => self.service.import_pass(user_id, &guard, force).await,
            PassMode::Export => self.service.export_pass(user_id, &guard).await,
            PassMode::Bidirectional => self.service.bidirectional_pass(user_id, &guard, force).await,
        }
    }

    /// Sync every connected user, bounded by the concurrency limit
    pub async fn sync_all_users(&self, mode: PassMode) -> Result<RoundResults> {
        let users = self.token_store.connected_users(&self.provider).await?;
        info!("Starting sync round for {} connected users", users.len());

        let mut set = JoinSet::new();
        for user_id in users {
            let this = self.clone();
            set.spawn(async move {
                let outcome = match this.limit.clone().acquire_owned().await {
                    Ok(_permit) => this.sync_user(user_id, mode, false).await,
                    Err(_) => Err(SyncError::ProviderUnavailable("coordinator shut down".to_string())),
                };
                (user_id, outcome)
            });
        }

        let mut results = RoundResults::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((user_id, Ok(result))) => {
                    info!("User {user_id} synced: {}", result.summary());
                    results.successful.insert(user_id, result);
                }
                Ok((user_id, Err(e))) => {
                    error!("User {user_id} sync failed: {e}");
                    results.failed.insert(user_id, e.to_string());
                }
                Err(e) => error!("Sync task panicked: {e}"),
            }
        }

        info!(
            "Sync round complete. Success: {}, Failed: {}",
            results.total_synced(),
            results.total_failed()
        );
        Ok(results)
    }

    /// Run rounds every `interval` until `shutdown` resolves
    pub async fn run(&self, interval: Duration, mode: PassMode, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sync_all_users(mode).await {
                        warn!("Sync round aborted: {e:#}");
                    }
                }
                _ = &mut shutdown => {
                    info!("Sync coordinator stopping");
                    break;
                }
            }
        }
    }
}

/// Results of a sync round over all users
#[derive(Debug, Default)]
pub struct RoundResults {
    pub successful: HashMap<i64, SyncResult>,
    pub failed: HashMap<i64, String>,
}

impl RoundResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_synced(&self) -> usize {
        self.successful.len()
    }

    pub fn total_failed(&self) -> usize {
        self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
