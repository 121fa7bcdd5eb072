use crate::errors::AppError;
use crate::metrics_cache::compute_checksum;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use moka::future::Cache;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

/// Caller identity resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolves access tokens against the identity provider's user endpoint.
///
/// Lookups are cached by token hash so the raw token is never a cache key.
#[derive(Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    cache: Cache<String, AuthUser>,
}

impl AuthClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::ExternalApiError(format!("Failed to create auth client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            cache: Cache::builder()
                .time_to_live(Duration::from_secs(300))
                .max_capacity(10_000)
                .build(),
        })
    }

    pub async fn resolve(&self, token: &str) -> Result<AuthUser, AppError> {
        let cache_key = compute_checksum(token);
        if let Some(user) = self.cache.get(&cache_key).await {
            return Ok(user);
        }

        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Auth request failed: {}", e)))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(AppError::Unauthorized(format!(
                "identity provider rejected token ({})",
                status
            )));
        }
        if !status.is_success() {
            return Err(AppError::ExternalApiError(format!(
                "Identity provider returned {}",
                status
            )));
        }

        let user: AuthUser = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse auth response: {}", e))
        })?;

        self.cache.insert(cache_key, user.clone()).await;
        Ok(user)
    }
}

/// Resolves the caller if a token is present. A present but invalid token
/// is an error; a missing one is `None`.
pub async fn optional_user(
    auth: Option<&AuthClient>,
    headers: &HeaderMap,
) -> Result<Option<AuthUser>, AppError> {
    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };
    let Some(auth) = auth else {
        tracing::debug!("Bearer token supplied but no identity provider configured");
        return Ok(None);
    };
    auth.resolve(token).await.map(Some)
}

pub async fn require_user(
    auth: Option<&AuthClient>,
    headers: &HeaderMap,
) -> Result<AuthUser, AppError> {
    let auth = auth.ok_or_else(|| {
        AppError::Unauthorized("authentication is not configured".to_string())
    })?;
    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;
    auth.resolve(token).await
}
