//! OAuth2 token handling for the provider connection.
//!
//! [`TokenGuard`] owns a user's lease and hands out valid access tokens,
//! refreshing through a [`TokenService`] shortly before expiry.
//! [`OAuthClient`] is the HTTP implementation of the token service.

pub mod guard;
pub mod oauth;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_GRANT_LIFETIME_SECS;

pub use guard::{GuardStatus, TokenGuard};
pub use oauth::{OAuthClient, OAuthConfig};

/// Errors raised while obtaining or refreshing tokens.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// No usable access token right now; a later refresh may succeed.
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    /// The connection was revoked and needs a fresh authorization flow.
    #[error("Provider connection is disconnected; re-authorization required")]
    Disconnected,

    /// The token endpoint rejected the grant (expired or revoked refresh token, bad client).
    #[error("Token grant rejected: {0}")]
    Rejected(String),

    /// The token endpoint could not be reached or failed.
    #[error("Token service unavailable: {0}")]
    Unavailable(String),
}

/// Raw answer of the token endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
}

/// An access token together with what is needed to renew it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLease {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl TokenLease {
    /// Build a lease from a grant. Providers may omit the refresh token on
    /// refresh, in which case the previous one stays valid.
    /// `expires_in` is clamped to [`MAX_GRANT_LIFETIME_SECS`].
    pub fn from_grant(grant: TokenGrant, previous_refresh: Option<String>, now: DateTime<Utc>) -> Self {
        let lifetime = Duration::try_seconds(grant.expires_in.clamp(0, MAX_GRANT_LIFETIME_SECS)).unwrap_or_default();
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.or(previous_refresh),
            expires_at: now.checked_add_signed(lifetime).unwrap_or(now),
        }
    }

    /// Whether the lease must be refreshed before use at `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.access_token.is_empty() || now >= self.expires_at - skew
    }
}

/// Token exchange and refresh collaborator.
#[async_trait]
pub trait TokenService: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError>;
}
