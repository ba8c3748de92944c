//! Errors that abort a whole sync pass.

use crate::auth::AuthError;
use crate::provider::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No valid token could be obtained, or the provider refused it.
    #[error("Provider authorization expired: {0}")]
    AuthExpired(String),

    /// Collections could not be enumerated or the token service is down.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<AuthError> for SyncError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unavailable(reason) => SyncError::ProviderUnavailable(reason),
            other => SyncError::AuthExpired(other.to_string()),
        }
    }
}

impl From<ProviderError> for SyncError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unauthorized => SyncError::AuthExpired(err.to_string()),
            other => SyncError::ProviderUnavailable(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        SyncError::Storage(format!("{err:#}"))
    }
}
