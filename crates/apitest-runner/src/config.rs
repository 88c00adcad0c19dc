//! Runner configuration.

use serde::Deserialize;
use std::time::Duration;

/// Runner configuration loaded from environment variables.
///
/// Environment variables are prefixed with `APITEST_`:
/// - `APITEST_MAX_CONCURRENT_TESTS`: In-flight test case limit (default: 10)
/// - `APITEST_DEFAULT_REQUEST_TIMEOUT`: Per-case timeout in seconds (default: 30)
/// - `APITEST_OAUTH2_SAFETY_MARGIN_SECS`: Refresh tokens this close to expiry (default: 30)
/// - `APITEST_MAX_BODY_SNAPSHOT_BYTES`: Response body bytes kept in results (default: 4096)
/// - `APITEST_FOLLOW_REDIRECTS`: Follow HTTP redirects (default: true)
/// - `APITEST_USER_AGENT`: User-Agent sent with requests
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_max_concurrent_tests")]
    pub max_concurrent_tests: usize,

    /// Seconds.
    #[serde(default = "default_request_timeout")]
    pub default_request_timeout: u64,

    #[serde(default = "default_safety_margin")]
    pub oauth2_safety_margin_secs: i64,

    #[serde(default = "default_max_body_snapshot_bytes")]
    pub max_body_snapshot_bytes: usize,

    #[serde(default = "default_true")]
    pub follow_redirects: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_max_concurrent_tests() -> usize {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_safety_margin() -> i64 {
    apitest_core::auth::DEFAULT_SAFETY_MARGIN_SECS
}

fn default_max_body_snapshot_bytes() -> usize {
    4096
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("apitest/{}", env!("CARGO_PKG_VERSION"))
}

impl RunnerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("APITEST_").from_env::<RunnerConfig>()
    }

    /// Load configuration from explicit `(name, value)` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed("APITEST_").from_iter::<_, RunnerConfig>(vars)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.default_request_timeout)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tests: default_max_concurrent_tests(),
            default_request_timeout: default_request_timeout(),
            oauth2_safety_margin_secs: default_safety_margin(),
            max_body_snapshot_bytes: default_max_body_snapshot_bytes(),
            follow_redirects: true,
            user_agent: default_user_agent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.max_concurrent_tests, 10);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.oauth2_safety_margin_secs, 30);
        assert!(config.follow_redirects);
        assert!(config.user_agent.starts_with("apitest/"));
    }

    #[test]
    fn test_from_vars() {
        let vars = vec![
            ("APITEST_MAX_CONCURRENT_TESTS".to_string(), "3".to_string()),
            ("APITEST_FOLLOW_REDIRECTS".to_string(), "false".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ];
        let config = RunnerConfig::from_vars(vars).unwrap();
        assert_eq!(config.max_concurrent_tests, 3);
        assert!(!config.follow_redirects);
        assert_eq!(config.default_request_timeout, 30);
        assert_eq!(config.max_body_snapshot_bytes, 4096);
    }

    #[test]
    fn test_from_vars_rejects_bad_value() {
        let vars = vec![("APITEST_MAX_CONCURRENT_TESTS".to_string(), "many".to_string())];
        assert!(RunnerConfig::from_vars(vars).is_err());
    }
}
