//! Per-user access token lease with single-flight refresh.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use tokio::sync::Mutex;

use super::{AuthError, TokenLease, TokenService};
use crate::storage::TokenStore;

enum GuardState {
    Connected(TokenLease),
    Disconnected,
}

/// Observable state of a guard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardStatus {
    Connected { expires_at: DateTime<Utc> },
    Disconnected,
}

/// Holds a user's token lease and hands out valid access tokens.
///
/// The lease sits behind an async mutex that stays locked for the duration
/// of a refresh, so concurrent callers wait for the in-flight refresh instead
/// of issuing their own. Providers rotate refresh tokens, and a second
/// refresh with the old token would invalidate the first.
pub struct TokenGuard {
    user_id: i64,
    provider: String,
    skew: Duration,
    service: Arc<dyn TokenService>,
    store: Option<Arc<dyn TokenStore>>,
    state: Mutex<GuardState>,
}

impl TokenGuard {
    /// Guard around an already known lease.
    pub fn new(
        user_id: i64,
        provider: impl Into<String>,
        lease: TokenLease,
        skew: Duration,
        service: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            user_id,
            provider: provider.into(),
            skew,
            service,
            store: None,
            state: Mutex::new(GuardState::Connected(lease)),
        }
    }

    /// Guard that starts disconnected until [`TokenGuard::connect`] succeeds.
    pub fn disconnected(
        user_id: i64,
        provider: impl Into<String>,
        skew: Duration,
        service: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            user_id,
            provider: provider.into(),
            skew,
            service,
            store: None,
            state: Mutex::new(GuardState::Disconnected),
        }
    }

    /// Restore the persisted lease of `user_id`. Missing or disconnected
    /// connections yield a disconnected guard.
    pub async fn load(
        user_id: i64,
        provider: impl Into<String>,
        skew: Duration,
        service: Arc<dyn TokenService>,
        store: Arc<dyn TokenStore>,
    ) -> anyhow::Result<Self> {
        let provider = provider.into();
        let state = match store.load(user_id, &provider).await? {
            Some(lease) => GuardState::Connected(lease),
            None => GuardState::Disconnected,
        };

        Ok(Self {
            user_id,
            provider,
            skew,
            service,
            store: Some(store),
            state: Mutex::new(state),
        })
    }

    /// Persist every lease change through `store`.
    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub async fn status(&self) -> GuardStatus {
        match &*self.state.lock().await {
            GuardState::Connected(lease) => GuardStatus::Connected {
                expires_at: lease.expires_at,
            },
            GuardState::Disconnected => GuardStatus::Disconnected,
        }
    }

    /// Return an access token valid for at least the refresh skew.
    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        let mut state = self.state.lock().await;

        let lease = match &mut *state {
            GuardState::Disconnected => return Err(AuthError::Disconnected),
            GuardState::Connected(lease) => lease,
        };

        let now = Utc::now();
        if !lease.needs_refresh(now, self.skew) {
            return Ok(lease.access_token.clone());
        }

        let Some(refresh_token) = lease.refresh_token.clone() else {
            warn!("User {}: access token expired and no refresh token is held", self.user_id);
            self.disconnect(&mut state).await;
            return Err(AuthError::Disconnected);
        };

        debug!("User {}: refreshing access token", self.user_id);
        match self.service.refresh(&refresh_token).await {
            Ok(grant) => {
                let renewed = TokenLease::from_grant(grant, Some(refresh_token), Utc::now());
                let token = renewed.access_token.clone();
                self.persist(&renewed).await;
                *state = GuardState::Connected(renewed);
                info!("User {}: access token refreshed", self.user_id);
                Ok(token)
            }
            Err(AuthError::Rejected(reason)) => {
                warn!("User {}: refresh token rejected ({reason}); disconnecting", self.user_id);
                self.disconnect(&mut state).await;
                Err(AuthError::Disconnected)
            }
            Err(e) => {
                warn!("User {}: token refresh failed: {e}", self.user_id);
                lease.access_token.clear();
                Err(AuthError::AuthRequired(e.to_string()))
            }
        }
    }

    /// Exchange an authorization code and install the resulting lease.
    pub async fn connect(&self, code: &str) -> Result<(), AuthError> {
        let mut state = self.state.lock().await;
        let grant = self.service.exchange_code(code).await?;
        let lease = TokenLease::from_grant(grant, None, Utc::now());
        self.persist(&lease).await;
        *state = GuardState::Connected(lease);
        info!("User {}: connected to {}", self.user_id, self.provider);
        Ok(())
    }

    /// Drop the current access token so the next call refreshes. Used after
    /// the provider rejects a token the guard believed valid.
    pub async fn invalidate(&self) {
        if let GuardState::Connected(lease) = &mut *self.state.lock().await {
            lease.access_token.clear();
        }
    }

    async fn disconnect(&self, state: &mut GuardState) {
        *state = GuardState::Disconnected;
        if let Some(store) = &self.store {
            if let Err(e) = store.mark_disconnected(self.user_id, &self.provider).await {
                warn!("User {}: failed to persist disconnect: {e}", self.user_id);
            }
        }
    }

    async fn persist(&self, lease: &TokenLease) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(self.user_id, &self.provider, lease).await {
                warn!("User {}: failed to persist token lease: {e}", self.user_id);
            }
        }
    }
}
