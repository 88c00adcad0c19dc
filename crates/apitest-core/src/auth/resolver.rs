//! Authentication resolver.
//!
//! Resolves an auth configuration into headers and query parameters to merge
//! into an outbound request.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::oauth2::{CachedToken, TokenCache, DEFAULT_TOKEN_LIFETIME_SECS};
use crate::error::AuthError;
use crate::model::{ApiKeyPlacement, AuthConfig, TokenCacheKey};

/// Default margin before expiry at which a cached token is refreshed.
pub const DEFAULT_SAFETY_MARGIN_SECS: i64 = 30;

/// Headers and query parameters added to a request by authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestDecoration {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

impl RequestDecoration {
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            headers: vec![(name.into(), value.into())],
            query: Vec::new(),
        }
    }

    pub fn query(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            headers: Vec::new(),
            query: vec![(name.into(), value.into())],
        }
    }

    fn bearer(token: &str) -> Self {
        Self::header("Authorization", format!("Bearer {}", token))
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.query.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

/// Authentication resolver.
///
/// Owns the OAuth2 token cache; clones share it.
#[derive(Debug, Clone)]
pub struct Authenticator {
    client: reqwest::Client,
    cache: TokenCache,
    safety_margin: Duration,
    token_timeout: std::time::Duration,
}

impl Authenticator {
    /// Create a resolver with an empty token cache.
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_cache(client, TokenCache::new())
    }

    /// Create a resolver backed by an existing token cache.
    pub fn with_cache(client: reqwest::Client, cache: TokenCache) -> Self {
        Self {
            client,
            cache,
            safety_margin: Duration::seconds(DEFAULT_SAFETY_MARGIN_SECS),
            token_timeout: std::time::Duration::from_secs(30),
        }
    }

    pub fn with_safety_margin(mut self, seconds: i64) -> Self {
        self.safety_margin = Duration::seconds(seconds);
        self
    }

    pub fn with_token_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.token_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Resolve authentication configuration to request decorations.
    pub async fn resolve(
        &self,
        config: &AuthConfig,
        now: DateTime<Utc>,
    ) -> Result<RequestDecoration, AuthError> {
        config.validate()?;

        match config {
            AuthConfig::Bearer { token } => Ok(RequestDecoration::bearer(token)),
            AuthConfig::ApiKey {
                key_name,
                key_value,
                placement,
            } => Ok(Self::resolve_api_key(key_name, key_value, *placement)),
            AuthConfig::Basic { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                Ok(RequestDecoration::header(
                    "Authorization",
                    format!("Basic {}", encoded),
                ))
            }
            AuthConfig::OAuth2 {
                client_id,
                client_secret,
                token_url,
                scope,
                extra,
            } => {
                let key = TokenCacheKey {
                    client_id: client_id.clone(),
                    token_url: token_url.clone(),
                    scope: scope.clone(),
                };
                let token = self
                    .cache
                    .get_or_fetch(&key, now, self.safety_margin, || {
                        self.acquire_token(&key, client_secret, extra, now)
                    })
                    .await?;
                Ok(RequestDecoration::bearer(&token.access_token))
            }
        }
    }

    fn resolve_api_key(
        key_name: &str,
        key_value: &str,
        placement: Option<ApiKeyPlacement>,
    ) -> RequestDecoration {
        match placement.unwrap_or_else(|| ApiKeyPlacement::infer(key_name)) {
            ApiKeyPlacement::Header => RequestDecoration::header(key_name, key_value),
            ApiKeyPlacement::Query => RequestDecoration::query(key_name, key_value),
        }
    }

    /// Client credentials grant against the token endpoint.
    async fn acquire_token(
        &self,
        key: &TokenCacheKey,
        client_secret: &str,
        extra: &BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<CachedToken, AuthError> {
        tracing::info!(
            client_id = %key.client_id,
            token_url = %key.token_url,
            scope = ?key.scope,
            "Acquiring OAuth2 token"
        );

        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "client_credentials"),
            ("client_id", key.client_id.as_str()),
            ("client_secret", client_secret),
        ];
        if let Some(ref scope) = key.scope {
            form.push(("scope", scope.as_str()));
        }
        for (k, v) in extra {
            form.push((k.as_str(), v.as_str()));
        }

        let response = self
            .client
            .post(&key.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.token_timeout)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                AuthError::token_acquisition_failed(format!(
                    "token request to {} failed: {}",
                    key.token_url, e
                ))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            AuthError::token_acquisition_failed(format!("failed to read token response: {}", e))
        })?;

        if !status.is_success() {
            let snippet: String = text.chars().take(200).collect();
            return Err(AuthError::token_acquisition_failed(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                snippet
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            AuthError::token_acquisition_failed(format!("malformed token response: {}", e))
        })?;

        if parsed.access_token.is_empty() {
            return Err(AuthError::token_acquisition_failed(
                "token response has an empty access_token",
            ));
        }

        let lifetime = parsed
            .expires_in
            .as_ref()
            .and_then(lifetime_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

        tracing::debug!(client_id = %key.client_id, expires_in = lifetime, "OAuth2 token acquired");

        let expires_at = Duration::try_seconds(lifetime)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| {
                AuthError::token_acquisition_failed(format!(
                    "token lifetime of {} seconds is out of range",
                    lifetime
                ))
            })?;

        Ok(CachedToken {
            access_token: parsed.access_token,
            expires_at,
        })
    }
}

/// Upper bound applied to `expires_in`.
const MAX_TOKEN_LIFETIME_SECS: i64 = 365 * 24 * 60 * 60;

/// `expires_in` as seconds, clamped to `0..=MAX_TOKEN_LIFETIME_SECS`.
/// Some providers send it as a string.
fn lifetime_secs(value: &serde_json::Value) -> Option<i64> {
    let secs = match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }?;
    Some(secs.clamp(0, MAX_TOKEN_LIFETIME_SECS))
}
