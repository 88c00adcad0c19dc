//! OAuth2 token cache with single-flight acquisition.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::AuthError;
use crate::model::TokenCacheKey;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// An access token and the instant it stops being valid.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Valid for at least `margin` beyond `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at > now + margin
    }
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Default)]
struct SlotState {
    token: Option<CachedToken>,
    last_error: Option<AuthError>,
}

/// Per-key slot. `generation` advances each time an acquisition completes.
#[derive(Debug, Default)]
struct KeySlot {
    generation: AtomicU64,
    state: Mutex<SlotState>,
}

/// Token cache keyed by `(client_id, token_url, scope)`.
///
/// Cloning shares the underlying cache. Acquisition for one key is
/// serialized by that key's lock: callers that queued behind an in-flight
/// acquisition reuse its outcome instead of issuing another request.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    slots: Arc<Mutex<HashMap<TokenCacheKey, Arc<KeySlot>>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, key: &TokenCacheKey) -> Arc<KeySlot> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Cached token for `key` if it is still fresh.
    pub async fn get(
        &self,
        key: &TokenCacheKey,
        now: DateTime<Utc>,
        margin: Duration,
    ) -> Option<CachedToken> {
        let slot = self.slot(key).await;
        let state = slot.state.lock().await;
        state
            .token
            .as_ref()
            .filter(|t| t.is_fresh(now, margin))
            .cloned()
    }

    /// Drop any cached token for `key`.
    pub async fn invalidate(&self, key: &TokenCacheKey) {
        self.slots.lock().await.remove(key);
    }

    /// Return a fresh cached token or acquire one with `fetch`.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &TokenCacheKey,
        now: DateTime<Utc>,
        margin: Duration,
        fetch: F,
    ) -> Result<CachedToken, AuthError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedToken, AuthError>>,
    {
        let slot = self.slot(key).await;
        let seen = slot.generation.load(Ordering::Acquire);
        let mut state = slot.state.lock().await;

        if let Some(token) = state.token.as_ref().filter(|t| t.is_fresh(now, margin)) {
            tracing::trace!(client_id = %key.client_id, "Using cached OAuth2 token");
            return Ok(token.clone());
        }

        // An acquisition finished while we waited for the lock: share its
        // outcome. The token was just issued, so it is used even when its
        // whole lifetime is shorter than `margin`.
        if slot.generation.load(Ordering::Acquire) != seen {
            if let Some(err) = state.last_error.as_ref() {
                return Err(err.clone());
            }
            if let Some(token) = state.token.as_ref() {
                return Ok(token.clone());
            }
        }

        let outcome = fetch().await;
        match &outcome {
            Ok(token) => {
                state.token = Some(token.clone());
                state.last_error = None;
            }
            Err(err) => {
                state.last_error = Some(err.clone());
            }
        }
        slot.generation.fetch_add(1, Ordering::Release);

        outcome
    }
}
