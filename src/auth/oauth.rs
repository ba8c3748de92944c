//! OAuth2 token endpoint client.
//!
//! Implements the code exchange and refresh grants against the Microsoft
//! identity platform (or any RFC 6749 compatible endpoint). The browser part
//! of the authorization flow happens outside this crate; callers hand the
//! received code to [`TokenService::exchange_code`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{AuthError, TokenGrant, TokenService};

/// Error codes for which retrying the same grant can never succeed.
const TERMINAL_GRANT_ERRORS: &[&str] = &[
    "invalid_grant",
    "invalid_client",
    "unauthorized_client",
    "interaction_required",
    "consent_required",
];

#[derive(Clone, Debug)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub timeout: Duration,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
}

/// HTTP token service.
pub struct OAuthClient {
    config: OAuthConfig,
    http: Client,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Result<Self, AuthError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        Ok(Self { config, http })
    }

    async fn request_grant(&self, grant_params: &[(&str, &str)]) -> Result<TokenGrant, AuthError> {
        let scopes = self.config.scopes.join(" ");
        let mut params: Vec<(&str, &str)> = vec![("client_id", self.config.client_id.as_str()), ("scope", &scopes)];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.as_str()));
        }
        params.extend_from_slice(grant_params);

        let resp = self
            .http
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.without_url().to_string()))?;

        let status = resp.status();
        if status.is_success() {
            let body: TokenResponse = resp
                .json()
                .await
                .map_err(|e| AuthError::Unavailable(format!("malformed token response: {}", e.without_url())))?;
            return Ok(TokenGrant {
                access_token: body.access_token,
                refresh_token: body.refresh_token,
                expires_in: body.expires_in.unwrap_or(3600),
            });
        }

        let error_code = resp.json::<TokenErrorResponse>().await.map(|b| b.error).ok();
        Err(classify_failure(status, error_code))
    }
}

/// Map a failed token endpoint answer onto the auth taxonomy.
fn classify_failure(status: StatusCode, error_code: Option<String>) -> AuthError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return AuthError::Unavailable(format!("token endpoint returned {status}"));
    }

    match error_code {
        Some(code) if TERMINAL_GRANT_ERRORS.contains(&code.as_str()) => AuthError::Rejected(code),
        Some(code) => AuthError::Rejected(format!("{code} ({status})")),
        None => AuthError::Rejected(format!("token endpoint returned {status}")),
    }
}

#[async_trait]
impl TokenService for OAuthClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AuthError> {
        let redirect_uri = self.config.redirect_uri.clone();
        self.request_grant(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &redirect_uri),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        self.request_grant(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .await
    }
}
