//! Services under test and their authentication configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::AuthError;

/// A service under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Service identity.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Human readable name.
    #[serde(default)]
    pub name: String,

    /// Base URL every test case path is relative to.
    pub base_url: String,

    /// Authentication applied to every request sent to this service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_config: Option<AuthConfig>,

    /// Whether the service is active.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Service {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            base_url: base_url.into(),
            auth_config: None,
            is_active: true,
        }
    }

    pub fn with_auth(mut self, auth_config: AuthConfig) -> Self {
        self.auth_config = Some(auth_config);
        self
    }

    /// Join the base URL with a path relative to it.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.is_empty() {
            base.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

/// Where an API key is attached to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyPlacement {
    Header,
    Query,
}

/// Header names treated as API key headers when no placement is configured.
const API_KEY_HEADER_NAMES: &[&str] = &["x-api-key", "api-key", "authorization", "x-auth-token"];

impl ApiKeyPlacement {
    /// Placement implied by the key name.
    pub fn infer(key_name: &str) -> Self {
        let lower = key_name.to_ascii_lowercase();
        if API_KEY_HEADER_NAMES.contains(&lower.as_str()) || lower.starts_with("x-") {
            ApiKeyPlacement::Header
        } else {
            ApiKeyPlacement::Query
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// Static bearer token.
    Bearer { token: String },

    /// API key sent as a header or query parameter.
    ApiKey {
        key_name: String,
        key_value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placement: Option<ApiKeyPlacement>,
    },

    /// HTTP basic authentication.
    Basic { username: String, password: String },

    /// OAuth2 client credentials grant.
    #[serde(rename = "oauth2")]
    OAuth2 {
        client_id: String,
        client_secret: String,
        token_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
        /// Additional form parameters sent to the token endpoint.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        extra: BTreeMap<String, String>,
    },
}

impl AuthConfig {
    /// Type tag as used in serialized configs.
    pub fn type_name(&self) -> &'static str {
        match self {
            AuthConfig::Bearer { .. } => "bearer",
            AuthConfig::ApiKey { .. } => "api_key",
            AuthConfig::Basic { .. } => "basic",
            AuthConfig::OAuth2 { .. } => "oauth2",
        }
    }

    /// Reject configurations whose required fields are empty.
    pub fn validate(&self) -> Result<(), AuthError> {
        fn required(type_name: &str, field: &str, value: &str) -> Result<(), AuthError> {
            if value.trim().is_empty() {
                return Err(AuthError::invalid_config(format!(
                    "{} auth requires '{}'",
                    type_name, field
                )));
            }
            Ok(())
        }

        let type_name = self.type_name();
        match self {
            AuthConfig::Bearer { token } => required(type_name, "token", token),
            AuthConfig::ApiKey {
                key_name,
                key_value,
                ..
            } => {
                required(type_name, "key_name", key_name)?;
                required(type_name, "key_value", key_value)
            }
            AuthConfig::Basic { username, password } => {
                required(type_name, "username", username)?;
                required(type_name, "password", password)
            }
            AuthConfig::OAuth2 {
                client_id,
                client_secret,
                token_url,
                ..
            } => {
                required(type_name, "client_id", client_id)?;
                required(type_name, "client_secret", client_secret)?;
                required(type_name, "token_url", token_url)?;
                reqwest::Url::parse(token_url).map_err(|e| {
                    AuthError::invalid_config(format!("invalid token_url '{}': {}", token_url, e))
                })?;
                Ok(())
            }
        }
    }

    /// Copy of this config with secrets masked, for display and logs.
    pub fn redacted(&self) -> AuthConfig {
        match self {
            AuthConfig::Bearer { token } => AuthConfig::Bearer {
                token: mask_secret(token),
            },
            AuthConfig::ApiKey {
                key_name,
                key_value,
                placement,
            } => AuthConfig::ApiKey {
                key_name: key_name.clone(),
                key_value: mask_secret(key_value),
                placement: *placement,
            },
            AuthConfig::Basic { username, password } => AuthConfig::Basic {
                username: username.clone(),
                password: mask_secret(password),
            },
            AuthConfig::OAuth2 {
                client_id,
                client_secret,
                token_url,
                scope,
                extra,
            } => AuthConfig::OAuth2 {
                client_id: client_id.clone(),
                client_secret: mask_secret(client_secret),
                token_url: token_url.clone(),
                scope: scope.clone(),
                extra: extra.clone(),
            },
        }
    }
}

/// Mask a secret, keeping two leading and trailing characters of long values.
pub(crate) fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 6 {
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        format!("{}{}{}", head, "*".repeat(chars.len() - 4), tail)
    } else {
        "*".repeat(chars.len())
    }
}

/// Identity of a cached OAuth2 token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenCacheKey {
    pub client_id: String,
    pub token_url: String,
    pub scope: Option<String>,
}
